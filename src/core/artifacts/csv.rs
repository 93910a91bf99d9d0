//! CSV export for review artifacts.
//!
//! Fields are quoted only when they contain a comma, a quote or a line
//! break, and quotes are doubled.

use crate::core::catalog::ImageRef;
use crate::core::matcher::{PairCandidate, UnmatchedRecord};
use crate::core::pool::HashFailure;
use std::borrow::Cow;
use std::io::Write;

pub const PAIR_COLUMNS: [&str; 13] = [
    "pair_id",
    "pair_type",
    "distance",
    "hash_method",
    "hash_size",
    "library_left",
    "id_left",
    "path_left",
    "name_left",
    "library_right",
    "id_right",
    "path_right",
    "name_right",
];

pub const UNMATCHED_COLUMNS: [&str; 4] = ["library", "id", "path", "name"];

/// Quote a field when it needs it
pub fn field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn write_row<W: Write>(writer: &mut W, fields: &[&str]) -> std::io::Result<()> {
    let line: Vec<Cow<'_, str>> = fields.iter().map(|f| field(f)).collect();
    writeln!(writer, "{}", line.join(","))
}

fn image_fields(image: &ImageRef) -> [String; 4] {
    [
        image.library.to_string(),
        image.id.clone(),
        image.path.display().to_string(),
        image.display_name.clone(),
    ]
}

/// Export candidate pairs in the given order
pub fn export_pairs<W: Write>(candidates: &[PairCandidate], mut writer: W) -> std::io::Result<()> {
    write_row(&mut writer, &PAIR_COLUMNS)?;

    for pair in candidates {
        let distance = pair.distance.to_string();
        let size = pair.hash_size.to_string();
        let left = image_fields(&pair.left);
        let right = image_fields(&pair.right);

        let mut row: Vec<&str> = vec![
            pair.pair_id.as_str(),
            pair.pair_type.as_str(),
            distance.as_str(),
            pair.hash_method.as_str(),
            size.as_str(),
        ];
        row.extend(left.iter().map(String::as_str));
        row.extend(right.iter().map(String::as_str));
        write_row(&mut writer, &row)?;
    }

    Ok(())
}

/// Export secondary items without a cross-library match
pub fn export_unmatched<W: Write>(unmatched: &[UnmatchedRecord], mut writer: W) -> std::io::Result<()> {
    write_row(&mut writer, &UNMATCHED_COLUMNS)?;
    for record in unmatched {
        let fields = image_fields(&record.image);
        let row: Vec<&str> = fields.iter().map(String::as_str).collect();
        write_row(&mut writer, &row)?;
    }
    Ok(())
}

/// One error log line per failure: `library,owner_id,kind,path,reason`
pub fn export_failures<W: Write>(failures: &[HashFailure], mut writer: W) -> std::io::Result<()> {
    for failure in failures {
        let path = failure.path.display().to_string();
        write_row(
            &mut writer,
            &[
                failure.library.as_str(),
                failure.owner_id.as_str(),
                failure.kind.as_str(),
                path.as_str(),
                failure.reason.as_str(),
            ],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::LibraryTag;
    use crate::core::hasher::{HashMethod, HashParams};
    use crate::core::matcher::PairType;
    use crate::core::pool::FailureKind;
    use std::path::PathBuf;

    fn image(library: LibraryTag, id: &str, name: &str) -> ImageRef {
        ImageRef {
            id: id.to_string(),
            library,
            path: PathBuf::from(format!("/lib/{}", name)),
            display_name: name.to_string(),
        }
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(field("IMG_0001.JPG"), "IMG_0001.JPG");
    }

    #[test]
    fn special_fields_are_quoted() {
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn pairs_have_header_and_one_row_each() {
        let pair = PairCandidate::new(
            PairType::CrossLibrary,
            image(LibraryTag::Photos, "p1", "beach, day 1.jpg"),
            image(LibraryTag::Iphoto, "s1", "beach.jpg"),
            3,
            HashParams::new(HashMethod::Phash, 16),
        );

        let mut out = Vec::new();
        export_pairs(&[pair.clone()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], PAIR_COLUMNS.join(","));
        assert!(lines[1].starts_with(&format!("{},cross_library,3,phash,16,photos,p1,", pair.pair_id)));
        assert!(lines[1].contains("\"beach, day 1.jpg\""));
        assert!(lines[1].ends_with("iphoto,s1,/lib/beach.jpg,beach.jpg"));
    }

    #[test]
    fn failures_have_no_header() {
        let failure = HashFailure {
            owner_id: "x".to_string(),
            library: LibraryTag::Photos,
            path: PathBuf::from("/lib/x.jpg"),
            kind: FailureKind::Decode,
            reason: "bad data".to_string(),
        };
        let mut out = Vec::new();
        export_failures(&[failure], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "photos,x,decode,/lib/x.jpg,bad data\n");
    }
}
