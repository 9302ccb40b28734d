use std::path::Path;

/// Class emitted by the model for images that contain no leaf.
pub const BACKGROUND_LABEL: &str = "Background_without_leaves";

/// Output order of the bundled plant disease model.
pub const DEFAULT_LABELS: [&str; 39] = [
    "Apple___Apple_scab",
    "Apple___Black_rot",
    "Apple___Cedar_apple_rust",
    "Apple___healthy",
    BACKGROUND_LABEL,
    "Blueberry___healthy",
    "Cherry___Powdery_mildew",
    "Cherry___healthy",
    "Corn___Cercospora_leaf_spot Gray_leaf_spot",
    "Corn___Common_rust",
    "Corn___Northern_Leaf_Blight",
    "Corn___healthy",
    "Grape___Black_rot",
    "Grape___Esca_(Black_Measles)",
    "Grape___Leaf_blight_(Isariopsis_Leaf_Spot)",
    "Grape___healthy",
    "Orange___Haunglongbing_(Citrus_greening)",
    "Peach___Bacterial_spot",
    "Peach___healthy",
    "Pepper,_bell___Bacterial_spot",
    "Pepper,_bell___healthy",
    "Potato___Early_blight",
    "Potato___Late_blight",
    "Potato___healthy",
    "Raspberry___healthy",
    "Soybean___healthy",
    "Squash___Powdery_mildew",
    "Strawberry___Leaf_scorch",
    "Strawberry___healthy",
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato___Tomato_mosaic_virus",
    "Tomato___healthy",
];

/// Index-to-label mapping for classifier output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Reads a class list with one label per line. Blank lines are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let labels = std::fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

pub fn is_background(label: &str) -> bool {
    label == BACKGROUND_LABEL
}

/// Turns `Tomato___Late_blight` into `Tomato - Late blight`.
pub fn display_name(label: &str) -> String {
    label.replace("___", " - ").replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_keeps_model_order() {
        let labels = LabelSet::default();
        assert_eq!(labels.len(), 39);
        assert_eq!(labels.get(0), Some("Apple___Apple_scab"));
        assert_eq!(labels.get(4), Some(BACKGROUND_LABEL));
        assert_eq!(labels.get(31), Some("Tomato___Late_blight"));
        assert_eq!(labels.get(38), Some("Tomato___healthy"));
        assert_eq!(labels.get(39), None);
    }

    #[test]
    fn display_name_strips_underscores() {
        assert_eq!(display_name("Tomato___Late_blight"), "Tomato - Late blight");
        assert_eq!(display_name("Pepper,_bell___healthy"), "Pepper, bell - healthy");
        for label in DEFAULT_LABELS {
            assert!(!display_name(label).contains('_'), "{label}");
        }
    }

    #[test]
    fn only_background_is_sentinel() {
        assert!(is_background(BACKGROUND_LABEL));
        assert!(DEFAULT_LABELS
            .iter()
            .filter(|label| is_background(label))
            .count()
            == 1);
    }

    #[test]
    fn class_list_file_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_list.txt");
        std::fs::write(&path, "Leaf___a\n\n  Leaf___b  \n").unwrap();

        let labels = LabelSet::from_file(&path).unwrap();
        assert_eq!(labels, LabelSet::new(vec!["Leaf___a".into(), "Leaf___b".into()]));
    }
}
