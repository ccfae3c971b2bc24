/// `@` path completion
///
/// Typing `name@` opens a listing of the aliased folder, `c@` a drive root
/// and a bare `@` the working directory. Entries are picked from the
/// listing and spliced back into the input line.

use crate::db::HistoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Character that opens the browser
pub const TRIGGER: char = '@';

/// One item of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

impl BrowserEntry {
    /// Directories get a trailing slash
    pub fn label(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Location of the trigger within an input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger<'a> {
    /// Text between the last whitespace and the `@`
    pub token: &'a str,
    /// Everything after the `@`
    pub after: &'a str,
    /// Byte offset where the token starts
    pub token_start: usize,
}

/// Find the last `@` of `input` and the token in front of it
pub fn find_trigger(input: &str) -> Option<Trigger<'_>> {
    let at = input.rfind(TRIGGER)?;
    let before = &input[..at];
    let token_start = before
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(i, c)| i + c.len_utf8());

    Some(Trigger {
        token: &before[token_start..],
        after: &input[at + TRIGGER.len_utf8()..],
        token_start,
    })
}

/// Replace the trigger token and everything after it with `replacement`
fn splice(input: &str, replacement: &str) -> String {
    match find_trigger(input) {
        Some(trigger) => format!("{}{}", &input[..trigger.token_start], replacement),
        None => format!("{}{}", input, replacement),
    }
}

/// Drive roots such as `C:\` that currently exist
///
/// Always empty on platforms without drive letters.
pub fn drive_roots() -> Vec<PathBuf> {
    if !cfg!(windows) {
        return Vec::new();
    }

    ('A'..='Z')
        .map(|letter| PathBuf::from(format!("{}:\\", letter)))
        .filter(|root| root.exists())
        .collect()
}

/// List a directory: directories first, then case-insensitive by name
pub fn scan_directory(dir: &Path) -> std::io::Result<Vec<BrowserEntry>> {
    let mut entries = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        entries.push(BrowserEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: path.is_dir(),
            path,
        });
    }

    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(entries)
}

/// Listing state behind the `@` picker
pub struct FileSystemBrowser {
    store: Arc<HistoryStore>,
    entries: Vec<BrowserEntry>,
    selected: usize,
    current_path: Option<PathBuf>,
}

impl FileSystemBrowser {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self {
            store,
            entries: Vec::new(),
            selected: 0,
            current_path: None,
        }
    }

    /// Re-evaluate the trigger after the input changed
    ///
    /// First match wins: an alias name, a drive letter, then a bare `@`
    /// for the working directory. Anything else closes the browser.
    pub async fn update(&mut self, input: &str, cwd: &Path) {
        let Some(trigger) = find_trigger(input) else {
            self.close();
            return;
        };

        if !trigger.after.is_empty() {
            self.close();
            return;
        }

        if trigger.token.is_empty() {
            self.scan(cwd);
            return;
        }

        match self.store.get_alias(trigger.token).await {
            Ok(Some(alias)) => {
                self.scan(Path::new(&alias.path));
                return;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(alias = trigger.token, error = %e, "alias lookup failed"),
        }

        let mut chars = trigger.token.chars();
        if let (Some(letter), None) = (chars.next(), chars.next()) {
            if letter.is_ascii_alphabetic() {
                let root = PathBuf::from(format!("{}:\\", letter.to_ascii_uppercase()));
                if drive_roots().contains(&root) {
                    self.scan(&root);
                    return;
                }
            }
        }

        self.close();
    }

    /// List `dir`. A failed scan clears and hides the browser.
    pub fn scan(&mut self, dir: &Path) {
        match scan_directory(dir) {
            Ok(entries) => {
                self.entries = entries;
                self.selected = 0;
                self.current_path = Some(dir.to_path_buf());
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "failed to scan directory");
                self.close();
            }
        }
    }

    pub fn close(&mut self) {
        self.entries.clear();
        self.selected = 0;
        self.current_path = None;
    }

    /// Whether a directory is being browsed, even an empty one
    pub fn is_visible(&self) -> bool {
        self.current_path.is_some()
    }

    pub fn entries(&self) -> &[BrowserEntry] {
        &self.entries
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&BrowserEntry> {
        self.entries.get(self.selected)
    }

    /// Directory being listed
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn move_up(&mut self) {
        if !self.entries.is_empty() {
            self.selected = (self.selected + self.entries.len() - 1) % self.entries.len();
        }
    }

    pub fn move_down(&mut self) {
        if !self.entries.is_empty() {
            self.selected = (self.selected + 1) % self.entries.len();
        }
    }

    /// Choose the highlighted entry
    ///
    /// A directory is browsed into and `None` is returned. A file closes the
    /// browser and yields the new input line with the file path spliced in
    /// place of the trigger.
    pub fn select_current(&mut self, input: &str) -> Option<String> {
        let entry = self.selected()?.clone();

        if entry.is_dir {
            self.scan(&entry.path);
            return None;
        }

        self.close();
        Some(splice(input, &entry.path.to_string_lossy()))
    }

    /// Take the highlighted entry (or the listed directory) plus a space,
    /// closing the browser
    pub fn accept_current(&mut self, input: &str) -> Option<String> {
        let target = match self.selected() {
            Some(entry) => entry.path.clone(),
            None => self.current_path.clone()?,
        };

        self.close();
        Some(format!("{} ", splice(input, &target.to_string_lossy())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::AliasKind;
    use tempfile::TempDir;

    fn create_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::create_dir(dir.path().join("Docs")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("A.md"), "").unwrap();
        std::fs::write(dir.path().join("src").join("main.rs"), "").unwrap();
        dir
    }

    async fn create_browser() -> FileSystemBrowser {
        let store = HistoryStore::new_test().await.unwrap();
        FileSystemBrowser::new(Arc::new(store))
    }

    fn labels(browser: &FileSystemBrowser) -> Vec<String> {
        browser.entries().iter().map(BrowserEntry::label).collect()
    }

    #[test]
    fn test_find_trigger() {
        let t = find_trigger("@").unwrap();
        assert_eq!((t.token, t.after, t.token_start), ("", "", 0));

        let t = find_trigger("cat docs@").unwrap();
        assert_eq!((t.token, t.after, t.token_start), ("docs", "", 4));

        let t = find_trigger("a@b c@xyz").unwrap();
        assert_eq!((t.token, t.after), ("c", "xyz"));

        assert!(find_trigger("no trigger").is_none());
    }

    #[test]
    fn test_scan_order() {
        let dir = create_tree();
        let entries = scan_directory(dir.path()).unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Docs", "src", "A.md", "b.txt"]);
        assert!(entries[0].is_dir);
        assert_eq!(entries[2].path, dir.path().join("A.md"));
    }

    #[tokio::test]
    async fn test_bare_trigger_lists_cwd() {
        let dir = create_tree();
        let mut browser = create_browser().await;

        browser.update("@", dir.path()).await;
        assert!(browser.is_visible());
        assert_eq!(browser.current_path(), Some(dir.path()));
        assert_eq!(labels(&browser), vec!["Docs/", "src/", "A.md", "b.txt"]);

        browser.update("cat @", dir.path()).await;
        assert!(browser.is_visible());
    }

    #[tokio::test]
    async fn test_text_after_trigger_closes() {
        let dir = create_tree();
        let mut browser = create_browser().await;

        browser.update("@", dir.path()).await;
        browser.update("@x", dir.path()).await;
        assert!(!browser.is_visible());

        browser.update("user@host", dir.path()).await;
        assert!(!browser.is_visible());
    }

    #[tokio::test]
    async fn test_alias_trigger() {
        let dir = create_tree();
        let cwd = TempDir::new().unwrap();
        let mut browser = create_browser().await;
        let src = dir.path().join("src");
        browser
            .store
            .add_alias("code", &src.to_string_lossy(), None, AliasKind::Folder)
            .await;

        browser.update("vim code@", cwd.path()).await;
        assert_eq!(browser.current_path(), Some(src.as_path()));
        assert_eq!(labels(&browser), vec!["main.rs"]);

        browser.update("vim nope@", cwd.path()).await;
        assert!(!browser.is_visible());
    }

    #[tokio::test]
    async fn test_select_directory_then_file() {
        let dir = create_tree();
        let mut browser = create_browser().await;

        browser.update("cat @", dir.path()).await;
        browser.move_down(); // src/
        assert_eq!(browser.select_current("cat @"), None);
        assert_eq!(browser.current_path(), Some(dir.path().join("src").as_path()));

        let line = browser.select_current("cat @").unwrap();
        let expected = format!("cat {}", dir.path().join("src").join("main.rs").display());
        assert_eq!(line, expected);
        assert!(!browser.is_visible());
    }

    #[tokio::test]
    async fn test_accept_current_appends_space() {
        let dir = create_tree();
        let mut browser = create_browser().await;

        browser.update("ls @", dir.path()).await;
        browser.move_up(); // wraps to b.txt
        assert_eq!(browser.selected().unwrap().name, "b.txt");

        let line = browser.accept_current("ls @").unwrap();
        assert_eq!(line, format!("ls {} ", dir.path().join("b.txt").display()));
        assert!(!browser.is_visible());
    }

    #[tokio::test]
    async fn test_empty_directory_stays_open() {
        let dir = create_tree();
        let empty = dir.path().join("Docs");
        let mut browser = create_browser().await;

        browser.update("cd @", dir.path()).await;
        assert_eq!(browser.select_current("cd @"), None);
        assert!(browser.is_visible());
        assert!(browser.entries().is_empty());
        assert_eq!(browser.current_path(), Some(empty.as_path()));

        browser.move_down();
        assert_eq!(browser.select_current("cd @"), None);

        // The listed directory itself can still be taken
        let line = browser.accept_current("cd @").unwrap();
        assert_eq!(line, format!("cd {} ", empty.display()));
        assert!(!browser.is_visible());
    }

    #[tokio::test]
    async fn test_scan_failure_hides() {
        let mut browser = create_browser().await;

        browser.scan(Path::new("/definitely/not/here"));
        assert!(!browser.is_visible());
        assert!(browser.current_path().is_none());
        assert!(browser.select_current("@").is_none());
    }

    #[test]
    fn test_drive_roots_off_windows() {
        if !cfg!(windows) {
            assert!(drive_roots().is_empty());
        }
    }
}
