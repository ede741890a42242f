// src/roster.rs

/// Staff list shipped with the desk, used for name suggestions only.
pub const DEFAULT_STAFF: [&str; 10] = [
    "Noy Vathana",
    "Chou Sapha",
    "You Ly Hieng",
    "Chroeng Panha",
    "Uy Mengsae",
    "Pha Chan Bory",
    "Chek Seang",
    "Som Tihak",
    "Touch Makara",
    "Chhon Sophanith",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffRoster {
    names: Vec<String>,
}

impl Default for StaffRoster {
    fn default() -> Self {
        Self::new(DEFAULT_STAFF.iter().map(|s| s.to_string()))
    }
}

impl StaffRoster {
    /// Blank entries are dropped.
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// Parses a comma-separated list (as found in configuration).
    pub fn from_csv_list(list: &str) -> Self {
        Self::new(list.split(',').map(str::to_string))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Roster names containing `input`, ignoring case. Nothing for empty input.
    pub fn suggest(&self, input: &str) -> Vec<&str> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.names
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }
}
