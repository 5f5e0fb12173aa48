// DriveShare Catalog
// Search filtering, view mode and display helpers for folder entries

use serde::{Deserialize, Serialize};

use crate::portal::Entry;

const MIB: u64 = 1_048_576;

/// Entries whose name contains `query`, case-insensitively, in listing order
pub fn filter_entries<'a>(entries: &'a [Entry], query: &str) -> Vec<&'a Entry> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return entries.iter().collect();
    }
    entries
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn toggle(self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }
}

/// Coarse file category, used to pick an icon or label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    Image,
    Video,
    Pdf,
    Spreadsheet,
    Document,
    Other,
}

impl EntryKind {
    pub fn of(entry: &Entry) -> Self {
        if entry.is_folder {
            return EntryKind::Folder;
        }
        Self::from_mime(&entry.mime_type)
    }

    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_lowercase();
        if mime.contains("folder") {
            EntryKind::Folder
        } else if mime.contains("image") {
            EntryKind::Image
        } else if mime.contains("video") {
            EntryKind::Video
        } else if mime.contains("pdf") {
            EntryKind::Pdf
        } else if mime.contains("spreadsheet") || mime.contains("excel") {
            EntryKind::Spreadsheet
        } else if mime.contains("document") || mime.contains("word") || mime.starts_with("text/") {
            EntryKind::Document
        } else {
            EntryKind::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Folder => "folder",
            EntryKind::Image => "image",
            EntryKind::Video => "video",
            EntryKind::Pdf => "pdf",
            EntryKind::Spreadsheet => "sheet",
            EntryKind::Document => "doc",
            EntryKind::Other => "file",
        }
    }
}

/// Human-readable size; folders have none
pub fn format_size(entry: &Entry) -> String {
    if entry.is_container() {
        return "--".to_string();
    }
    if entry.size < MIB {
        format!("{} KB", (entry.size as f64 / 1024.0).round() as u64)
    } else {
        format!("{:.2} MB", entry.size as f64 / MIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<Entry> {
        vec![
            Entry::file("1", "Invoice-March.pdf", "application/pdf", 2048),
            Entry::folder("2", "Photos"),
            Entry::file("3", "notes.txt", "text/plain", 10),
            Entry::file("4", "old invoice.docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document", 4096),
        ]
    }

    #[test]
    fn test_filter_is_case_insensitive_and_ordered() {
        let all = entries();
        let hits: Vec<&str> = filter_entries(&all, "INVOICE").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(hits, vec!["1", "4"]);
    }

    #[test]
    fn test_empty_query_returns_everything() {
        let all = entries();
        assert_eq!(filter_entries(&all, "").len(), 4);
        assert!(filter_entries(&all, "   ").is_empty());
        assert!(filter_entries(&all, "zzz").is_empty());
    }

    #[test]
    fn test_query_whitespace_is_significant() {
        let all = entries();
        let hits: Vec<&str> = filter_entries(&all, " invoice").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(hits, vec!["4"]);
    }

    #[test]
    fn test_view_mode_toggle() {
        assert_eq!(ViewMode::default(), ViewMode::Grid);
        assert_eq!(ViewMode::Grid.toggle(), ViewMode::List);
        assert_eq!(ViewMode::List.toggle().toggle(), ViewMode::List);
    }

    #[test]
    fn test_entry_kind() {
        let all = entries();
        assert_eq!(EntryKind::of(&all[0]), EntryKind::Pdf);
        assert_eq!(EntryKind::of(&all[1]), EntryKind::Folder);
        assert_eq!(EntryKind::of(&all[2]), EntryKind::Document);
        assert_eq!(EntryKind::of(&all[3]), EntryKind::Document);
        assert_eq!(EntryKind::from_mime("image/png"), EntryKind::Image);
        assert_eq!(EntryKind::from_mime("video/mp4"), EntryKind::Video);
        assert_eq!(EntryKind::from_mime("application/vnd.ms-excel"), EntryKind::Spreadsheet);
        assert_eq!(EntryKind::from_mime("application/zip"), EntryKind::Other);

        let mut flagged = Entry::file("5", "odd", "application/zip", 1);
        flagged.is_folder = true;
        assert_eq!(EntryKind::of(&flagged), EntryKind::Folder);
    }

    #[test]
    fn test_format_size() {
        let all = entries();
        assert_eq!(format_size(&all[0]), "2 KB");
        assert_eq!(format_size(&all[1]), "--");
        assert_eq!(format_size(&Entry::file("x", "big.iso", "application/octet-stream", 5 * MIB + MIB / 2)), "5.50 MB");
    }
}
