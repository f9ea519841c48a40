//! Filename-only relevance filter. Classification never reads file
//! contents: a full collection can hold 50k+ files.

/// Recognized payload suffixes, lowercase, leading dot included.
/// Multi-part archive suffixes must appear before their single-part
/// tails would ever be consulted, but since matching is suffix-based
/// either entry accepts the file, so order is not significant here.
const DEFAULT_EXTENSIONS: &[&str] = &[
    // Nintendo
    ".nes", ".fds", ".nsf", ".unf", ".nez",
    ".sfc", ".smc", ".swc", ".fig", ".bsx", ".st",
    ".gb", ".gbc", ".gba", ".sgb",
    ".n64", ".v64", ".z64", ".n64dd", ".rom",
    ".gcm", ".iso", ".rvz", ".ciso", ".wbfs", ".wad",
    ".nds", ".nde", ".srl",
    ".3ds", ".cia", ".3dsx",
    ".xci", ".nsp",
    // Sega
    ".sms", ".gg", ".sg", ".sgd",
    ".md", ".gen", ".bin", ".smd",
    ".32x",
    // Sony
    ".pbp", ".cso", ".ecm", ".sbi",
    ".vpk",
    // Atari
    ".a26", ".a52", ".a78",
    ".lnx", ".lyx",
    ".jag", ".j64",
    // Handhelds
    ".ws", ".wsc", ".pc2",
    ".ngp", ".ngc",
    ".sv", ".vb", ".min",
    // Computers
    ".pce", ".int", ".col",
    ".d64", ".g64", ".t64", ".prg", ".crt",
    ".adf", ".adz", ".dms", ".hdf",
    ".cas", ".dsk",
    // Disc images
    ".cue", ".chd", ".mds", ".ccd", ".sub", ".img",
    ".m3u", ".mdf", ".nrg",
    // Archives
    ".zip", ".7z", ".rar", ".tar.gz", ".gz", ".bz2",
];

/// Pure predicate over filenames (not paths). Case-insensitive suffix
/// match; an unknown or absent suffix simply returns false.
pub struct ExtensionFilter {
    suffixes: Vec<String>,
}

impl ExtensionFilter {
    pub fn new() -> Self {
        Self {
            suffixes: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Build from a user allowlist. Entries are lowercased and get a
    /// leading dot if missing, so "ZIP" and ".zip" mean the same thing.
    pub fn from_allowlist<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = entries
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().to_lowercase();
                if e.starts_with('.') { e } else { format!(".{e}") }
            })
            .filter(|e| e.len() > 1)
            .collect();
        Self { suffixes }
    }

    pub fn is_relevant(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.suffixes.iter().any(|s| lower.ends_with(s.as_str()))
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new()
    }
}
