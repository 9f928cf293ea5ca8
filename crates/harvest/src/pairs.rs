use std::path::Path;

use model::StationPair;
use serde::Deserialize;

use crate::HarvestError;

#[derive(Debug, Deserialize)]
struct PairRecord {
    source: String,
    destination: String,
}

/// Loads the station pair list from a `source,destination` CSV. Rows with an
/// empty field are skipped; input order is preserved because it is also the
/// dispatch order of the harvest.
pub fn load_pairs(path: &Path) -> Result<Vec<StationPair>, HarvestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut pairs = vec![];
    for row in reader.deserialize() {
        let record: PairRecord = row?;
        let source = record.source.trim();
        let destination = record.destination.trim();
        if source.is_empty() || destination.is_empty() {
            continue;
        }
        pairs.push(StationPair::new(source, destination));
    }
    log::info!("loaded {} station pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_pairs_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source,destination").unwrap();
        writeln!(file, "005504747,005501024").unwrap();
        writeln!(file, "005510009,005504747").unwrap();
        writeln!(file, " ,005501024").unwrap();

        let pairs = load_pairs(file.path()).unwrap();
        assert_eq!(
            pairs,
            vec![
                StationPair::new("005504747", "005501024"),
                StationPair::new("005510009", "005504747"),
            ]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_pairs(Path::new("/does/not/exist.csv"));
        assert!(matches!(result, Err(HarvestError::Pairs(_))));
    }
}
