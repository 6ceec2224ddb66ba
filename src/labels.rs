use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Static mapping from model output index to a human-readable label.
#[derive(Debug, Clone)]
pub struct ClassTable {
    labels: Vec<String>,
}

impl ClassTable {
    /// Loads a newline-delimited labels file, one label per output index.
    pub fn from_file(filepath: &Path) -> io::Result<Self> {
        let file = File::open(filepath)?;
        let reader = io::BufReader::new(file);
        let mut labels = Vec::new();

        for line_result in reader.lines() {
            let line = line_result?;
            let label = line.trim();
            if label.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Empty label at index {}", labels.len()),
                ));
            }
            labels.push(label.to_string());
        }

        Ok(Self { labels })
    }

    pub fn from_labels(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn label(&self, index: usize) -> String {
        match self.labels.get(index) {
            Some(label) => label.clone(),
            None => format!("unknown class {}", index),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loads_labels_from_file() {
        let path = std::env::temp_dir().join("live_classifier_labels_test.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "tench").unwrap();
        writeln!(file, "goldfish").unwrap();
        writeln!(file, "great white shark").unwrap();

        let table = ClassTable::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.label(1), "goldfish");
    }

    #[test]
    fn test_out_of_range_index_gets_fallback_label() {
        let table = ClassTable::from_labels(vec!["cat".to_string()]);
        assert_eq!(table.label(0), "cat");
        assert_eq!(table.label(7), "unknown class 7");
    }
}
