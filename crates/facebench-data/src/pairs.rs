//! LFW pairs-protocol file parsing.
//!
//! `pairs.txt` holds the 10-fold evaluation splits: a header line
//! `<folds> <pairs_per_half>`, then per fold `pairs_per_half` matched lines
//! (`name idx1 idx2`) followed by `pairs_per_half` mismatched lines
//! (`name1 idx1 name2 idx2`). `pairsDevTrain.txt` is a single split with a
//! `<count>` header. Fields are whitespace-separated; image paths follow
//! the `name/name_0001.jpg` convention.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One labeled evaluation pair: two relative image paths and the ground
/// truth "same identity" flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairExample {
    pub image1: String,
    pub image2: String,
    pub same: bool,
}

/// The LFW pairs protocol: a designated training list plus disjoint
/// evaluation folds.
#[derive(Debug)]
pub struct LfwDataset {
    pub train: Vec<PairExample>,
    pub folds: Vec<Vec<PairExample>>,
}

impl LfwDataset {
    /// Load `pairsDevTrain.txt` and `pairs.txt` from the dataset root.
    pub fn load(root: &Path) -> Result<Self, DatasetError> {
        let train_path = root.join("pairsDevTrain.txt");
        let pairs_path = root.join("pairs.txt");

        let train_text = read(&train_path)?;
        let pairs_text = read(&pairs_path)?;

        let train = parse_dev_train(&train_text)?;
        let folds = parse_pairs(&pairs_text)?;

        tracing::info!(
            train_pairs = train.len(),
            folds = folds.len(),
            fold_pairs = folds.first().map(|f| f.len()).unwrap_or(0),
            "dataset loaded"
        );

        Ok(Self { train, folds })
    }

    pub fn fold_count(&self) -> usize {
        self.folds.len()
    }
}

fn read(path: &Path) -> Result<String, DatasetError> {
    fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn image_path(name: &str, index: u32) -> String {
    format!("{name}/{name}_{index:04}.jpg")
}

/// A numbered line iterator that skips blank lines.
fn lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
}

fn parse_err(line: usize, message: impl Into<String>) -> DatasetError {
    DatasetError::Parse { line, message: message.into() }
}

fn parse_index(line: usize, field: &str) -> Result<u32, DatasetError> {
    field
        .parse()
        .map_err(|_| parse_err(line, format!("expected image index, got {field:?}")))
}

/// Parse a matched (`name idx1 idx2`) or mismatched (`name1 idx1 name2 idx2`)
/// pair line.
fn parse_pair_line(line_no: usize, line: &str) -> Result<PairExample, DatasetError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [name, idx1, idx2] => Ok(PairExample {
            image1: image_path(name, parse_index(line_no, idx1)?),
            image2: image_path(name, parse_index(line_no, idx2)?),
            same: true,
        }),
        [name1, idx1, name2, idx2] => Ok(PairExample {
            image1: image_path(name1, parse_index(line_no, idx1)?),
            image2: image_path(name2, parse_index(line_no, idx2)?),
            same: false,
        }),
        _ => Err(parse_err(
            line_no,
            format!("expected 3 or 4 fields, got {}", fields.len()),
        )),
    }
}

/// Parse the k-fold `pairs.txt` content.
pub fn parse_pairs(text: &str) -> Result<Vec<Vec<PairExample>>, DatasetError> {
    let mut iter = lines(text);

    let (header_no, header) = iter.next().ok_or_else(|| parse_err(0, "empty pairs file"))?;
    let fields: Vec<&str> = header.split_whitespace().collect();
    let [folds, per_half] = fields.as_slice() else {
        return Err(parse_err(header_no, "header must be `<folds> <pairs_per_half>`"));
    };
    let fold_count: usize = folds
        .parse()
        .map_err(|_| parse_err(header_no, format!("bad fold count {folds:?}")))?;
    let per_half: usize = per_half
        .parse()
        .map_err(|_| parse_err(header_no, format!("bad pair count {per_half:?}")))?;
    if fold_count == 0 || per_half == 0 {
        return Err(parse_err(header_no, "fold and pair counts must be positive"));
    }

    let mut result = Vec::with_capacity(fold_count);
    for fold in 0..fold_count {
        let mut examples = Vec::with_capacity(2 * per_half);
        for half in 0..2 {
            let expect_same = half == 0;
            for _ in 0..per_half {
                let (line_no, line) = iter.next().ok_or_else(|| {
                    parse_err(0, format!("truncated file inside fold {fold}"))
                })?;
                let example = parse_pair_line(line_no, line)?;
                if example.same != expect_same {
                    return Err(parse_err(
                        line_no,
                        format!(
                            "expected a {} pair in fold {fold}",
                            if expect_same { "matched" } else { "mismatched" }
                        ),
                    ));
                }
                examples.push(example);
            }
        }
        result.push(examples);
    }

    Ok(result)
}

/// Parse the single-split `pairsDevTrain.txt` content.
pub fn parse_dev_train(text: &str) -> Result<Vec<PairExample>, DatasetError> {
    let mut iter = lines(text);

    let (header_no, header) = iter.next().ok_or_else(|| parse_err(0, "empty train file"))?;
    let count: usize = header
        .split_whitespace()
        .next()
        .unwrap_or("")
        .parse()
        .map_err(|_| parse_err(header_no, format!("bad pair count {header:?}")))?;
    if count == 0 {
        return Err(parse_err(header_no, "pair count must be positive"));
    }

    let mut examples = Vec::with_capacity(2 * count);
    for half in 0..2 {
        let expect_same = half == 0;
        for _ in 0..count {
            let (line_no, line) = iter
                .next()
                .ok_or_else(|| parse_err(0, "truncated train file"))?;
            let example = parse_pair_line(line_no, line)?;
            if example.same != expect_same {
                return Err(parse_err(
                    line_no,
                    format!(
                        "expected a {} pair",
                        if expect_same { "matched" } else { "mismatched" }
                    ),
                ));
            }
            examples.push(example);
        }
    }

    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIRS: &str = "\
2\t2
Aaron_Peirsol\t1\t2
Mia_Hamm\t1\t3
Aaron_Peirsol\t1\tMia_Hamm\t1
Mia_Hamm\t2\tZach_Braff\t1
Zach_Braff\t1\t2
Aaron_Peirsol\t2\t3
Zach_Braff\t2\tAaron_Peirsol\t1
Mia_Hamm\t1\tZach_Braff\t2
";

    const DEV_TRAIN: &str = "\
2
Aaron_Peirsol\t1\t2
Mia_Hamm\t1\t2
Aaron_Peirsol\t1\tMia_Hamm\t1
Mia_Hamm\t2\tAaron_Peirsol\t2
";

    #[test]
    fn test_parse_pairs_shape() {
        let folds = parse_pairs(PAIRS).unwrap();
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0].len(), 4);
        assert_eq!(folds[1].len(), 4);
    }

    #[test]
    fn test_parse_pairs_paths_and_flags() {
        let folds = parse_pairs(PAIRS).unwrap();
        assert_eq!(
            folds[0][0],
            PairExample {
                image1: "Aaron_Peirsol/Aaron_Peirsol_0001.jpg".into(),
                image2: "Aaron_Peirsol/Aaron_Peirsol_0002.jpg".into(),
                same: true,
            }
        );
        assert_eq!(
            folds[0][2],
            PairExample {
                image1: "Aaron_Peirsol/Aaron_Peirsol_0001.jpg".into(),
                image2: "Mia_Hamm/Mia_Hamm_0001.jpg".into(),
                same: false,
            }
        );
        assert!(folds[1][0].same);
        assert!(!folds[1][3].same);
    }

    #[test]
    fn test_parse_dev_train() {
        let train = parse_dev_train(DEV_TRAIN).unwrap();
        assert_eq!(train.len(), 4);
        assert!(train[0].same && train[1].same);
        assert!(!train[2].same && !train[3].same);
        assert_eq!(train[3].image1, "Mia_Hamm/Mia_Hamm_0002.jpg");
    }

    #[test]
    fn test_truncated_pairs_rejected() {
        let text = "2\t2\nAaron_Peirsol\t1\t2\n";
        assert!(matches!(parse_pairs(text), Err(DatasetError::Parse { .. })));
    }

    #[test]
    fn test_bad_index_carries_line_number() {
        let text = "1\t1\nAaron_Peirsol\tx\t2\nA\t1\tB\t1\n";
        match parse_pairs(text) {
            Err(DatasetError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_misplaced_mismatch_rejected() {
        // A 4-field line where a matched pair is required.
        let text = "1\t1\nA\t1\tB\t1\nA\t1\tB\t2\n";
        assert!(matches!(parse_pairs(text), Err(DatasetError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_zero_folds_rejected() {
        assert!(parse_pairs("0\t300\n").is_err());
    }

    #[test]
    fn test_empty_file_rejected() {
        assert!(parse_pairs("").is_err());
        assert!(parse_dev_train("").is_err());
    }

    #[test]
    fn test_blank_lines_skipped() {
        let text = "1\t1\n\nAaron_Peirsol\t1\t2\n\nA\t1\tB\t1\n";
        let folds = parse_pairs(text).unwrap();
        assert_eq!(folds[0].len(), 2);
    }
}
