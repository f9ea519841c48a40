use crate::types::{Classification, ConfidenceTier};
use anyhow::{Result, anyhow};
use regex::Regex;
use std::collections::HashMap;

/// Ordered platform pattern table. Ordering is load-bearing: more
/// specific entries (digit suffixes, CD/Color/Advance variants) must
/// stay above the broader entries that would otherwise shadow them.
/// The regex crate has no lookahead, so "X but not X-variant" rules are
/// (match, veto) pairs: the entry wins only when `pattern` matches and
/// `veto` does not.
type Row = (&'static str, Option<&'static str>, &'static str, &'static str);

const STANDARD_TABLE: &[Row] = &[
    // Nintendo
    (r"(?i)^Nintendo.*Super Nintendo", None, "snes", "Super Nintendo Entertainment System"),
    (r"(?i)^Nintendo.*Super Famicom", None, "snes", "Super Nintendo Entertainment System"),
    (r"(?i)^Nintendo.*Nintendo Entertainment System", None, "nes", "Nintendo Entertainment System"),
    (r"(?i)^Nintendo.*Famicom.*Entertainment System", None, "nes", "Nintendo Entertainment System"),
    (r"(?i)^Nintendo\s*-\s*NES\b", None, "nes", "Nintendo Entertainment System"),
    (r"(?i)^Nintendo.*Famicom", Some(r"(?i)^Nintendo.*Famicom\s+(Disk|&)"), "nes", "Nintendo Entertainment System"),
    (r"(?i)^Nintendo.*Family Computer", Some(r"(?i)^Nintendo.*Family Computer\s+Disk"), "nes", "Nintendo Entertainment System"),
    (r"(?i)^Nintendo.*Family Computer.*Disk.*System", None, "fds", "Famicom Disk System"),
    (r"(?i)^Nintendo.*Famicom.*Disk.*System", None, "fds", "Famicom Disk System"),
    (r"(?i)^Nintendo.*Game Boy", Some(r"(?i)^Nintendo.*Game Boy\s+(Color|Advance)"), "gb", "Game Boy"),
    (r"(?i)^Nintendo.*Game Boy Color", None, "gbc", "Game Boy Color"),
    (r"(?i)^Nintendo.*Game Boy Advance", None, "gba", "Game Boy Advance"),
    (r"(?i)^Nintendo.*Nintendo 64DD", None, "n64dd", "Nintendo 64DD"),
    (r"(?i)^Nintendo.*Nintendo 64", None, "n64", "Nintendo 64"),
    (r"(?i)^Nintendo.*GameCube", None, "gc", "GameCube"),
    (r"(?i)^Nintendo.*Wii", Some(r"(?i)^Nintendo.*Wii\s+U"), "wii", "Wii"),
    (r"(?i)^Nintendo.*Wii U", None, "wiiu", "Wii U"),
    (r"(?i)^Nintendo.*Nintendo DS", Some(r"(?i)^Nintendo.*Nintendo DSi"), "nds", "Nintendo DS"),
    (r"(?i)^Nintendo.*Nintendo DSi", None, "nds", "Nintendo DS"),
    (r"(?i)^NDS", None, "nds", "Nintendo DS"),
    (r"(?i)^N64", None, "n64", "Nintendo 64"),
    (r"(?i)^.*Nintendo DS", None, "nds", "Nintendo DS"),
    (r"(?i)^.*Game Boy", Some(r"(?i)^.*Game Boy\s+(Color|Advance)"), "gb", "Game Boy"),
    (r"(?i)^.*GB", Some(r"(?i)^.*GB\s*C"), "gb", "Game Boy"),
    (r"(?i)^Nintendo.*Nintendo 3DS", None, "n3ds", "Nintendo 3DS"),
    (r"(?i)^Nintendo.*Virtual Boy", None, "virtualboy", "Virtual Boy"),
    (r"(?i)^Nintendo.*Pokemon Mini", None, "pokemini", "Pokemon Mini"),
    // Nintendo, preprocessed names
    (r"(?i)^Nintendo 64$", None, "n64", "Nintendo 64"),
    (r"(?i)^Nintendo Famicom Disk System$", None, "fds", "Famicom Disk System"),
    (r"(?i)^Nintendo Game Boy$", None, "gb", "Game Boy"),
    (r"(?i)^Nintendo Game Boy Color$", None, "gbc", "Game Boy Color"),
    (r"(?i)^Nintendo Game Boy Advance$", None, "gba", "Game Boy Advance"),
    (r"(?i)^Nintendo Pokemon Mini$", None, "pokemini", "Pokemon Mini"),
    (r"(?i)^Nintendo Virtual Boy$", None, "virtualboy", "Virtual Boy"),
    (r"(?i)^Nintendo DS$", None, "nds", "Nintendo DS"),
    (r"(?i)^Nintendo Super Famicom & Super Entertainment System$", None, "snes", "Super Nintendo Entertainment System"),
    (r"(?i)^Nintendo Famicom & Entertainment System$", None, "nes", "Nintendo Entertainment System"),
    // Sega
    (r"(?i)^Sega.*Master System", None, "mastersystem", "Sega Master System"),
    (r"(?i)^Sega.*Mark III", None, "mastersystem", "Sega Master System"),
    (r"(?i)^Sega.*Mega Drive", None, "genesis", "Sega Genesis"),
    (r"(?i)^Sega.*Genesis", None, "genesis", "Sega Genesis"),
    (r"(?i)^Sega.*Game Gear", None, "gamegear", "Sega Game Gear"),
    (r"(?i)^Sega.*32X", None, "sega32x", "Sega 32X"),
    (r"(?i)^Sega.*Mega.?CD", None, "segacd", "Sega CD"),
    (r"(?i)^.*Genesis", None, "genesis", "Sega Genesis"),
    (r"(?i)^.*Mega Drive", None, "genesis", "Sega Genesis"),
    (r"(?i)^Sega.*Sega CD", None, "segacd", "Sega CD"),
    (r"(?i)^Sega.*Saturn", None, "saturn", "Sega Saturn"),
    (r"(?i)^Sega.*Dreamcast", None, "dreamcast", "Sega Dreamcast"),
    (r"(?i)^Sega.*SG-1000", None, "sg1000", "Sega SG-1000"),
    // Sega, preprocessed names
    (r"(?i)^Sega 32X$", None, "sega32x", "Sega 32X"),
    (r"(?i)^Sega Dreamcast$", None, "dreamcast", "Sega Dreamcast"),
    (r"(?i)^Sega Game Gear$", None, "gamegear", "Sega Game Gear"),
    (r"(?i)^Sega Mark III & Master System$", None, "mastersystem", "Sega Master System"),
    (r"(?i)^Sega Mega Drive & Genesis$", None, "megadrive", "Sega Mega Drive"),
    (r"(?i)^Sega Mega-CD & Sega CD$", None, "segacd", "Sega CD"),
    (r"(?i)^Sega Saturn$", None, "saturn", "Sega Saturn"),
    (r"(?i)^Sega Game 1000$", None, "sg1000", "Sega SG-1000"),
    // Sony
    (r"(?i)^Sony.*PlayStation", Some(r"(?i)^Sony.*PlayStation\s+(2|3|4|Portable|Vita)"), "psx", "PlayStation"),
    (r"(?i)^Sony.*PlayStation 2", None, "ps2", "PlayStation 2"),
    (r"(?i)^Sony.*PlayStation 3", None, "ps3", "PlayStation 3"),
    (r"(?i)^Sony.*PlayStation 4", None, "ps4", "PlayStation 4"),
    (r"(?i)^Sony.*PlayStation Portable", None, "psp", "PlayStation Portable"),
    (r"(?i)^Sony.*PlayStation Vita", None, "psvita", "PlayStation Vita"),
    (r"(?i)^.*PlayStation 1", None, "psx", "PlayStation"),
    (r"(?i)^.*PS1", None, "psx", "PlayStation"),
    (r"(?i)^.*PSX", None, "psx", "PlayStation"),
    // Atari
    (r"(?i)^Atari.*2600", None, "atari2600", "Atari 2600"),
    (r"(?i)^Atari.*5200", None, "atari5200", "Atari 5200"),
    (r"(?i)^Atari.*7800", None, "atari7800", "Atari 7800"),
    (r"(?i)^Atari.*Lynx", None, "atarilynx", "Atari Lynx"),
    (r"(?i)^Atari.*Jaguar", Some(r"(?i)^Atari.*Jaguar\s+CD"), "atarijaguar", "Atari Jaguar"),
    (r"(?i)^Atari.*Jaguar CD", None, "atarijaguarcd", "Atari Jaguar CD"),
    (r"(?i)^Atari.*8-bit", None, "atari800", "Atari 8-bit Family"),
    (r"(?i)^Atari.*ST", None, "atarist", "Atari ST"),
    (r"(?i)^Atari.*XE", None, "atarixe", "Atari XE"),
    (r"(?i)^Atari 8bit$", None, "atari800", "Atari 8-bit"),
    (r"(?i)^Atari Lynx$", None, "atarilynx", "Atari Lynx"),
    (r"(?i)^Atari ST$", None, "atarist", "Atari ST"),
    (r"(?i)^Atari 2600 & VCS$", None, "atari2600", "Atari 2600"),
    (r"(?i)^Atari 5200$", None, "atari5200", "Atari 5200"),
    (r"(?i)^Atari 7800$", None, "atari7800", "Atari 7800"),
    // PC
    (r"(?i)^DOS", None, "pc", "PC (DOS)"),
    (r"(?i)^IBM.*PC", None, "pc", "PC (IBM Compatible)"),
    (r"(?i)^.*PC and Compatibles", None, "pc", "PC (IBM Compatible)"),
    // Other systems
    (r"(?i)^Commodore.*64", None, "c64", "Commodore 64"),
    (r"(?i)^Commodore.*Amiga", None, "amiga", "Commodore Amiga"),
    (r"(?i)^Coleco.*ColecoVision", None, "colecovision", "ColecoVision"),
    (r"(?i)^Mattel.*Intellivision", None, "intellivision", "Mattel Intellivision"),
    (r"(?i)^NEC.*PC Engine", None, "pcengine", "PC Engine"),
    (r"(?i)^NEC.*TurboGrafx", None, "pcengine", "TurboGrafx-16"),
    (r"(?i)^SNK.*Neo.?Geo Pocket", Some(r"(?i)^SNK.*Neo.?Geo Pocket\s+Color"), "ngp", "Neo Geo Pocket"),
    (r"(?i)^SNK.*Neo.?Geo Pocket Color", None, "ngpc", "Neo Geo Pocket Color"),
    (r"(?i)^Bandai.*WonderSwan", Some(r"(?i)^Bandai.*WonderSwan\s+Color"), "wonderswan", "WonderSwan"),
    (r"(?i)^Bandai.*WonderSwan Color", None, "wonderswancolor", "WonderSwan Color"),
    (r"(?i)^3DO", None, "3do", "3DO Interactive Multiplayer"),
    (r"(?i)^Amstrad.*CPC", None, "amstradcpc", "Amstrad CPC"),
    (r"(?i)^Apple.*Apple II", None, "apple2", "Apple II"),
    (r"(?i)^.*MSX2", None, "msx", "MSX2"),
    (r"(?i)^.*MSX", Some(r"(?i)^.*MSX2"), "msx", "MSX"),
    (r"(?i)^Sinclair.*ZX Spectrum", None, "zxspectrum", "ZX Spectrum"),
    (r"(?i)^Microsoft.*Xbox", Some(r"(?i)^Microsoft.*Xbox\s+360"), "xbox", "Microsoft Xbox"),
    (r"(?i)^Microsoft.*Xbox 360", None, "xbox360", "Microsoft Xbox 360"),
    (r"(?i)^.*Macintosh", None, "macintosh", "Apple Macintosh"),
    // Other systems, preprocessed names
    (r"(?i)^3DO Interactive Multiplayer$", None, "3do", "3DO Interactive Multiplayer"),
    (r"(?i)^.*3DO", None, "3do", "3DO Interactive Multiplayer"),
    (r"(?i)^Bandai WonderSwan Color$", None, "wonderswancolor", "Bandai WonderSwan Color"),
    (r"(?i)^Bandai WonderSwan$", None, "wonderswan", "Bandai WonderSwan"),
    (r"(?i)^.*WonderSwan Color", None, "wonderswancolor", "Bandai WonderSwan Color"),
    (r"(?i)^.*WonderSwan", None, "wonderswan", "Bandai WonderSwan"),
    (r"(?i)^Coleco ColecoVision$", None, "coleco", "ColecoVision"),
    (r"(?i)^.*ColecoVision", None, "coleco", "ColecoVision"),
    (r"(?i)^GCE Vectrex$", None, "vectrex", "GCE Vectrex"),
    (r"(?i)^.*Vectrex", None, "vectrex", "GCE Vectrex"),
    (r"(?i)^Magnavox Odyssey", None, "odyssey2", "Magnavox Odyssey 2"),
    (r"(?i)^.*Odyssey", None, "odyssey2", "Magnavox Odyssey 2"),
    (r"(?i)^Mattel Intellivision$", None, "intellivision", "Mattel Intellivision"),
    (r"(?i)^.*Intellivision", None, "intellivision", "Mattel Intellivision"),
    (r"(?i)^NEC PC-Engine & TurboGrafx-16$", None, "pcengine", "PC Engine"),
    (r"(?i)^NEC SuperGrafx$", None, "supergrafx", "PC Engine SuperGrafx"),
    (r"(?i)^NEC PC-8801$", None, "pc98", "NEC PC-98"),
    (r"(?i)^SNK Neo-Geo CD$", None, "neogeocd", "Neo Geo CD"),
    (r"(?i)^SNK Neo-Geo Pocket Color$", None, "ngpc", "Neo Geo Pocket Color"),
    (r"(?i)^SNK Neo-Geo Pocket$", None, "ngp", "Neo Geo Pocket"),
    (r"(?i)^.*Neo-Geo CD", None, "neogeocd", "Neo Geo CD"),
    (r"(?i)^.*Neo-Geo Pocket Color", None, "ngpc", "Neo Geo Pocket Color"),
    (r"(?i)^.*Neo-Geo Pocket", None, "ngp", "Neo Geo Pocket"),
    (r"(?i)^Sony PlayStation$", None, "psx", "PlayStation"),
    (r"(?i)^Sony PlayStation 2$", None, "ps2", "PlayStation 2"),
    (r"(?i)^Sony - PlayStation Portable$", None, "psp", "PlayStation Portable"),
    (r"(?i)^Watara Supervision$", None, "supervision", "Watara Supervision"),
    (r"(?i)^.*Supervision", None, "supervision", "Watara Supervision"),
    (r"(?i)^Commodore Amiga$", None, "amiga", "Commodore Amiga"),
    (r"(?i)^.*Amiga", None, "amiga", "Commodore Amiga"),
    (r"(?i)^Sharp X68000$", None, "x68000", "Sharp X68000"),
    (r"(?i)^Sharp X1$", None, "x1", "Sharp X1"),
    (r"(?i)^.*X68000", None, "x68000", "Sharp X68000"),
    (r"(?i)^Tandy TRS-80.*Model I$", None, "trs80", "TRS-80"),
    (r"(?i)^Tandy TRS-80.*Model III$", None, "trs80", "TRS-80"),
    (r"(?i)^Tandy TRS-80.*Color Computer$", None, "coco", "TRS-80 Color Computer"),
    (r"(?i)^Tiger Gizmondo$", None, "gizmondo", "Tiger Gizmondo"),
    (r"(?i)^Sinclair ZX Spectrum$", None, "zxspectrum", "ZX Spectrum"),
    (r"(?i)^Pokitto", None, "pokitto", "Pokitto"),
    (r"(?i)^Dragon", None, "dragon32", "Dragon Data"),
    (r"(?i)^Tsukuda Othello Multivision$", None, "othello", "Othello Multivision"),
    // Arcade
    (r"(?i)^.*Arcade", None, "arcade", "Arcade"),
    (r"(?i)^Neo.?Geo", Some(r"(?i)^Neo.?Geo\s+Pocket"), "neogeo", "Neo Geo"),
    (r"(?i)^FinalBurn.*Arcade", None, "arcade", "Arcade"),
    (r"(?i)^MAME", None, "arcade", "Arcade (MAME)"),
    (r"(?i)^.*Atomiswave", None, "atomiswave", "Atomiswave Arcade"),
    (r"(?i)^.*Cannonball", None, "cannonball", "Cannonball (OutRun Engine)"),
    // Catch-alls for tool-generated names that slipped past the
    // specialized tier (unknown codes, unlisted set descriptions).
    (r"(?i)^Good", None, "unknown", "Unknown Good Tool Collection"),
    (r"(?i)^FinalBurn Neo - ", None, "arcade", "Arcade (FinalBurn Neo)"),
];

/// Folder names that are recognized but deliberately not organized,
/// with a human-readable reason.
const EXCLUSION_TABLE: &[(&str, &str)] = &[
    (r"(?i)^Sharp.*X68000", "X68000 not supported by the target frontend"),
    (r"(?i)^Tiger.*Gizmondo", "Gizmondo not supported by the target frontend"),
    (r"(?i)^Dragon Data.*Dragon", "Dragon Data systems not supported by the target frontend"),
    (r"(?i)^.*TRS-80", "TRS-80 systems not supported by the target frontend"),
    (r"(?i)^Sharp.*X1", "Sharp X1 not supported by the target frontend"),
    (r"(?i)^Tsukuda.*Othello", "Othello Multivision not supported by the target frontend"),
    (r"(?i)^Watara.*Supervision", "Watara Supervision not supported by the target frontend"),
    (r"(?i)^GCE.*Vectrex", "Vectrex support limited in the target frontend"),
    (r"(?i)^Magnavox.*Odyssey", "Odyssey systems support limited in the target frontend"),
    (r"(?i)^Philips.*Videopac", "Videopac support limited in the target frontend"),
    (r"(?i)^.*Pokitto", "Pokitto not supported by the target frontend"),
];

/// GoodTools abbreviated platform codes (uppercased for lookup).
const GOOD_TOOL_CODES: &[(&str, (&str, &str))] = &[
    ("NES", ("nes", "Nintendo Entertainment System")),
    ("SNES", ("snes", "Super Nintendo Entertainment System")),
    ("N64", ("n64", "Nintendo 64")),
    ("GEN", ("genesis", "Sega Genesis")),
    ("SMS", ("mastersystem", "Sega Master System")),
    ("GG", ("gamegear", "Sega Game Gear")),
    ("32X", ("sega32x", "Sega 32X")),
    ("MCD", ("segacd", "Sega CD")),
    ("SAT", ("saturn", "Sega Saturn")),
    ("PCE", ("pcengine", "PC Engine")),
    ("LYNX", ("atarilynx", "Atari Lynx")),
    ("5200", ("atari5200", "Atari 5200")),
    ("7800", ("atari7800", "Atari 7800")),
    ("2600", ("atari2600", "Atari 2600")),
    ("A26", ("atari2600", "Atari 2600")),
    ("A78", ("atari7800", "Atari 7800")),
    ("A52", ("atari5200", "Atari 5200")),
    ("GBC", ("gbc", "Game Boy Color")),
    ("GB", ("gb", "Game Boy")),
    ("GBA", ("gba", "Game Boy Advance")),
    ("COL", ("coleco", "ColecoVision")),
    ("INTV", ("intellivision", "Mattel Intellivision")),
];

/// FinalBurn Neo set descriptions (exact match after the dash).
const FINALBURN_SETS: &[(&str, (&str, &str))] = &[
    ("NES Games", ("nes", "Nintendo Entertainment System")),
    ("SNES Games", ("snes", "Super Nintendo Entertainment System")),
    ("Genesis Games", ("genesis", "Sega Genesis")),
    ("Master System Games", ("mastersystem", "Sega Master System")),
    ("Game Gear Games", ("gamegear", "Sega Game Gear")),
    ("PC Engine Games", ("pcengine", "PC Engine")),
    ("Neo Geo Games", ("neogeo", "Neo Geo")),
    ("CPS Games", ("arcade", "Arcade (CPS)")),
    ("Arcade Games", ("arcade", "Arcade")),
];

/* =========================
   Specialized tier
   ========================= */

enum SpecializedRule {
    /// `Good<CODE> <version>` tool-generated names.
    GoodTools {
        pattern: Regex,
        codes: HashMap<&'static str, (&'static str, &'static str)>,
    },
    /// `FinalBurn Neo - <set description>` names.
    FinalBurn {
        pattern: Regex,
        sets: HashMap<&'static str, (&'static str, &'static str)>,
    },
    /// Bare `MAME ...` names, always arcade.
    Mame { pattern: Regex },
}

struct SpecializedMatcher {
    name: &'static str,
    /// Percent score for tie-breaking; ties resolve by registration order.
    confidence: u32,
    rule: SpecializedRule,
}

impl SpecializedMatcher {
    fn try_match(&self, folder_name: &str) -> Option<(String, String)> {
        match &self.rule {
            SpecializedRule::GoodTools { pattern, codes } => {
                let caps = pattern.captures(folder_name)?;
                let code = caps[1].to_uppercase();
                match codes.get(code.as_str()) {
                    Some((sc, dn)) => Some((sc.to_string(), dn.to_string())),
                    None => Some(("unknown".into(), format!("Good {code} Collection"))),
                }
            }
            SpecializedRule::FinalBurn { pattern, sets } => {
                let caps = pattern.captures(folder_name)?;
                let desc = caps[1].trim();
                match sets.get(desc) {
                    Some((sc, dn)) => Some((sc.to_string(), dn.to_string())),
                    None => Some(("arcade".into(), format!("Arcade (FinalBurn Neo {desc})"))),
                }
            }
            SpecializedRule::Mame { pattern } => pattern
                .is_match(folder_name)
                .then(|| ("arcade".to_string(), "Arcade (MAME)".to_string())),
        }
    }
}

/* =========================
   Preprocessing tier
   ========================= */

/// One normalization step. Steps are pure: given a name they either
/// produce a rewritten name or pass it through untouched.
enum PreprocessStep {
    /// Collapses `Platform - Games/Applications/Firmware/...` forms to
    /// the base platform name (first matching pattern wins).
    Subcategory { patterns: Vec<Regex> },
    /// Strips `[FORMAT]` markers and trailing `(Retool)`-style parens.
    FormatIndicators { patterns: Vec<Regex> },
    /// Drops redundant publisher prefixes (`Microsoft - MSX` -> `MSX`).
    Publisher { rules: Vec<(Regex, &'static str)> },
}

impl PreprocessStep {
    fn apply(&self, name: &str) -> Option<String> {
        match self {
            PreprocessStep::Subcategory { patterns } => {
                for p in patterns {
                    if let Some(caps) = p.captures(name) {
                        return Some(caps[1].trim().to_string());
                    }
                }
                None
            }
            PreprocessStep::FormatIndicators { patterns } => {
                let mut out = name.to_string();
                let mut changed = false;
                for p in patterns {
                    let next = p.replace_all(&out, "").trim().to_string();
                    if next != out {
                        out = next;
                        changed = true;
                    }
                }
                changed.then_some(out)
            }
            PreprocessStep::Publisher { rules } => {
                for (p, replacement) in rules {
                    if p.is_match(name) {
                        return Some(p.replace(name, *replacement).trim().to_string());
                    }
                }
                None
            }
        }
    }
}

/* =========================
   Standard tier
   ========================= */

struct StandardPattern {
    pattern: Regex,
    veto: Option<Regex>,
    shortcode: &'static str,
    display_name: &'static str,
}

/// Three-tier folder-name classifier. All matcher tables are built once
/// here and owned by the instance, so independent classifiers can
/// coexist (parallel tests) and the precedence contract lives in one
/// place.
pub struct FolderClassifier {
    specialized: Vec<SpecializedMatcher>,
    preprocess: Vec<PreprocessStep>,
    standard: Vec<StandardPattern>,
    exclusions: Vec<(Regex, &'static str)>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| anyhow!("invalid pattern {pattern:?}: {e}"))
}

impl FolderClassifier {
    pub fn new(enable_subcategory_processing: bool) -> Result<Self> {
        let specialized = vec![
            SpecializedMatcher {
                name: "good_tools",
                confidence: 95,
                rule: SpecializedRule::GoodTools {
                    pattern: compile(r"(?i)^Good([A-Za-z0-9]+)\b")?,
                    codes: GOOD_TOOL_CODES.iter().copied().collect(),
                },
            },
            SpecializedMatcher {
                name: "finalburn_neo",
                confidence: 85,
                rule: SpecializedRule::FinalBurn {
                    pattern: compile(r"(?i)^FinalBurn Neo - (.+)$")?,
                    sets: FINALBURN_SETS.iter().copied().collect(),
                },
            },
            SpecializedMatcher {
                name: "mame",
                confidence: 75,
                rule: SpecializedRule::Mame {
                    pattern: compile(r"(?i)^MAME")?,
                },
            },
        ];

        let subcategory_words =
            "Games|Applications|Firmware|Educational|Compilations|Coverdisks|Samplers|Operating Systems|Demos|Various";
        let mut preprocess = Vec::new();
        if enable_subcategory_processing {
            preprocess.push(PreprocessStep::Subcategory {
                patterns: vec![
                    compile(r"(?i)^(.+?)\s+-\s+\w+\s+-\s+(Games|Applications|Firmware|Educational|Various)\s+-\s+\[.+?\]")?,
                    compile(r"(?i)^(.+?)\s+-\s+\w+\s+-\s+(Games|Applications|Firmware|Educational|Various)")?,
                    compile(&format!(r"(?i)^(.+?)\s+-\s+({subcategory_words})\s+-\s+\[.+?\]"))?,
                    compile(&format!(r"(?i)^(.+?)\s+-\s+({subcategory_words})"))?,
                ],
            });
        }
        preprocess.push(PreprocessStep::FormatIndicators {
            patterns: vec![
                compile(r"\s*-\s*\[.+?\]\s*")?,
                compile(r"\s*\[.+?\]\s*")?,
                compile(r"\s*\(.+?\)\s*$")?,
            ],
        });
        preprocess.push(PreprocessStep::Publisher {
            rules: vec![(compile(r"(?i)^Microsoft\s+-\s+(MSX.*)$")?, "$1")],
        });

        let standard = STANDARD_TABLE
            .iter()
            .map(|&(pattern, veto, shortcode, display_name)| {
                Ok(StandardPattern {
                    pattern: compile(pattern)?,
                    veto: veto.map(compile).transpose()?,
                    shortcode,
                    display_name,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let exclusions = EXCLUSION_TABLE
            .iter()
            .map(|(pattern, reason)| Ok((compile(pattern)?, *reason)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { specialized, preprocess, standard, exclusions })
    }

    /// Reason the folder is recognized-but-unsupported, if any.
    /// Checked by the orchestrator before classification.
    pub fn exclusion_reason(&self, folder_name: &str) -> Option<&'static str> {
        self.exclusions
            .iter()
            .find(|(p, _)| p.is_match(folder_name))
            .map(|(_, reason)| *reason)
    }

    /// Classify one directory name. Tiers run in fixed priority order
    /// and the first success wins; `None` means "unknown", which the
    /// caller treats as a reportable outcome, not an error.
    pub fn classify(&self, folder_name: &str) -> Option<Classification> {
        // Qualifier and region scans run on the raw name regardless of
        // which tier produces the base match.
        let variant_tag = detect_variant_tag(folder_name);
        let region_hint = detect_region_hint(folder_name);

        if let Some((shortcode, display_name)) = self.match_specialized(folder_name) {
            return Some(Classification {
                shortcode,
                display_name,
                tier: ConfidenceTier::Specialized,
                variant_tag,
                region_hint,
            });
        }

        let normalized = self.normalize(folder_name);
        if normalized != folder_name {
            if let Some((shortcode, display_name)) = self.match_standard(&normalized) {
                return Some(Classification {
                    shortcode: shortcode.to_string(),
                    display_name: display_name.to_string(),
                    tier: ConfidenceTier::Preprocessed,
                    variant_tag,
                    region_hint,
                });
            }
        }

        self.match_standard(folder_name)
            .map(|(shortcode, display_name)| Classification {
                shortcode: shortcode.to_string(),
                display_name: display_name.to_string(),
                tier: ConfidenceTier::Standard,
                variant_tag,
                region_hint,
            })
    }

    /// Name of the specialized handler that matches, for diagnostics.
    pub fn specialized_handler(&self, folder_name: &str) -> Option<&'static str> {
        self.best_specialized(folder_name).map(|(m, _)| m.name)
    }

    fn match_specialized(&self, folder_name: &str) -> Option<(String, String)> {
        self.best_specialized(folder_name).map(|(_, hit)| hit)
    }

    fn best_specialized(&self, folder_name: &str) -> Option<(&SpecializedMatcher, (String, String))> {
        let mut best: Option<(&SpecializedMatcher, (String, String))> = None;
        for m in &self.specialized {
            if let Some(hit) = m.try_match(folder_name) {
                // Strictly-greater keeps registration order on ties.
                let better = best.as_ref().is_none_or(|(b, _)| m.confidence > b.confidence);
                if better {
                    best = Some((m, hit));
                }
            }
        }
        best
    }

    /// Run the preprocessing chain. Each step sees the output of the
    /// previous one; steps that do not apply pass the name through.
    pub fn normalize(&self, folder_name: &str) -> String {
        let mut name = folder_name.to_string();
        for step in &self.preprocess {
            if let Some(next) = step.apply(&name) {
                name = next;
            }
        }
        name
    }

    fn match_standard(&self, name: &str) -> Option<(&'static str, &'static str)> {
        self.standard
            .iter()
            .find(|row| {
                row.pattern.is_match(name)
                    && row.veto.as_ref().is_none_or(|v| !v.is_match(name))
            })
            .map(|row| (row.shortcode, row.display_name))
    }
}

/// Format qualifier scan, independent of the matching tier.
/// "decrypted" must be checked before "encrypted": the latter is a
/// substring of the former.
pub fn detect_variant_tag(folder_name: &str) -> Option<String> {
    let lower = folder_name.to_lowercase();
    for tag in ["bigendian", "byteswapped", "decrypted", "encrypted"] {
        if lower.contains(tag) {
            return Some(tag.to_string());
        }
    }
    None
}

/// Regional token used only by the regional resolver. Disk-system
/// names yield no hint: those always resolve on their own shortcode.
pub fn detect_region_hint(folder_name: &str) -> Option<String> {
    let lower = folder_name.to_lowercase();
    let has_disk = lower.contains("disk");
    if lower.contains("super famicom") {
        return Some("superfamicom".into());
    }
    if (lower.contains("famicom") || lower.contains("family computer")) && !has_disk {
        return Some("famicom".into());
    }
    if lower.contains("super nintendo") {
        return Some("snes".into());
    }
    if lower.contains("nintendo entertainment system") {
        return Some("nes".into());
    }
    let has_cd = lower.contains("cd");
    if lower.contains("turbografx") && !has_cd {
        return Some("turbografx".into());
    }
    if lower.contains("pc engine") && !has_cd {
        return Some("pcengine".into());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> FolderClassifier {
        FolderClassifier::new(true).unwrap()
    }

    #[test]
    fn good_tools_patterns_take_the_specialized_tier() {
        let c = classifier();
        let r = c.classify("GoodNES v3.27").unwrap();
        assert_eq!(r.shortcode, "nes");
        assert_eq!(r.tier, ConfidenceTier::Specialized);

        let r = c.classify("Good32X v1.02").unwrap();
        assert_eq!(r.shortcode, "sega32x");

        // Lowercase table keys were a recurring trap; lookup is
        // case-insensitive via uppercased codes.
        let r = c.classify("GoodGen 3.00").unwrap();
        assert_eq!(r.shortcode, "genesis");
    }

    #[test]
    fn unknown_good_code_falls_back_to_unknown_bucket() {
        let r = classifier().classify("GoodVBOY v1.0").unwrap();
        assert_eq!(r.shortcode, "unknown");
        assert!(r.display_name.contains("VBOY"));
    }

    #[test]
    fn finalburn_and_mame_handlers() {
        let c = classifier();
        assert_eq!(c.classify("FinalBurn Neo - NES Games").unwrap().shortcode, "nes");
        assert_eq!(c.classify("FinalBurn Neo - CPS Games").unwrap().shortcode, "arcade");
        // Unknown set descriptions default to arcade.
        assert_eq!(
            c.classify("FinalBurn Neo - Mystery Platform").unwrap().shortcode,
            "arcade"
        );
        assert_eq!(c.classify("MAME 0.245").unwrap().shortcode, "arcade");
        assert_eq!(c.specialized_handler("MAME 0.245"), Some("mame"));
    }

    #[test]
    fn subcategory_names_consolidate_before_lookup() {
        let c = classifier();
        assert_eq!(c.normalize("Atari 2600 & VCS - Games (Retool)"), "Atari 2600 & VCS");
        assert_eq!(
            c.normalize("Nintendo Game Boy - Applications (Retool)"),
            "Nintendo Game Boy"
        );
        assert_eq!(c.normalize("Atari 8bit - Games - [BIN] (Retool)"), "Atari 8bit");

        let r = c.classify("Atari 2600 & VCS - Games (Retool)").unwrap();
        assert_eq!(r.shortcode, "atari2600");
        assert_eq!(r.tier, ConfidenceTier::Preprocessed);
    }

    #[test]
    fn publisher_prefix_is_stripped_for_msx() {
        let c = classifier();
        assert_eq!(c.normalize("Microsoft - MSX (Parent-Clone) (Retool)"), "MSX");
        assert_eq!(c.normalize("Microsoft - MSX2 (Retool)"), "MSX2");
    }

    #[test]
    fn msx2_wins_over_the_broader_msx_pattern() {
        // Precedence check: the digit-suffixed entry must be consulted
        // before the vetoed broad entry.
        let r = classifier().classify("Microsoft - MSX2 (Parent-Clone)").unwrap();
        assert_eq!(r.shortcode, "msx");
        assert_eq!(r.tier, ConfidenceTier::Preprocessed);
    }

    #[test]
    fn veto_patterns_keep_variants_apart() {
        let c = classifier();
        assert_eq!(c.classify("Nintendo - Game Boy (Retool)").unwrap().shortcode, "gb");
        assert_eq!(c.classify("Nintendo - Game Boy Color").unwrap().shortcode, "gbc");
        assert_eq!(c.classify("Nintendo - Game Boy Advance").unwrap().shortcode, "gba");
        assert_eq!(c.classify("Sony - PlayStation").unwrap().shortcode, "psx");
        assert_eq!(c.classify("Sony - PlayStation 2").unwrap().shortcode, "ps2");
        assert_eq!(c.classify("Microsoft - Xbox 360").unwrap().shortcode, "xbox360");
        assert_eq!(c.classify("Nintendo - Wii U").unwrap().shortcode, "wiiu");
        assert_eq!(c.classify("Nintendo - Wii").unwrap().shortcode, "wii");
    }

    #[test]
    fn disk_system_names_resolve_to_their_own_shortcode() {
        let c = classifier();
        let r = c.classify("Nintendo - Family Computer Disk System").unwrap();
        assert_eq!(r.shortcode, "fds");
        assert_eq!(r.region_hint, None);

        let r = c.classify("Nintendo - Famicom & Entertainment System - Games").unwrap();
        assert_eq!(r.shortcode, "nes");
    }

    #[test]
    fn unmatched_names_return_none() {
        let c = classifier();
        assert!(c.classify("Random Holiday Photos").is_none());
        assert!(c.classify("").is_none());
    }

    #[test]
    fn exclusion_table_is_consulted_separately() {
        let c = classifier();
        assert!(c.exclusion_reason("Sharp - X68000 (Retool)").is_some());
        assert!(c.exclusion_reason("Watara Supervision").is_some());
        assert!(c.exclusion_reason("Nintendo - Nintendo 64").is_none());
    }

    #[test]
    fn variant_tags_come_from_a_secondary_scan() {
        assert_eq!(
            detect_variant_tag("Nintendo - Nintendo 64 (BigEndian)").as_deref(),
            Some("bigendian")
        );
        assert_eq!(
            detect_variant_tag("Nintendo - Nintendo 64 (ByteSwapped)").as_deref(),
            Some("byteswapped")
        );
        // "decrypted" contains "encrypted"; make sure it is not
        // misreported.
        assert_eq!(
            detect_variant_tag("Nintendo DS (Decrypted)").as_deref(),
            Some("decrypted")
        );
        assert_eq!(
            detect_variant_tag("Nintendo DS (Encrypted)").as_deref(),
            Some("encrypted")
        );
        assert_eq!(detect_variant_tag("Nintendo - Nintendo 64"), None);

        // The tag is populated even when the base match is standard-tier.
        let r = classifier().classify("Nintendo - Nintendo 64 (BigEndian)").unwrap();
        assert_eq!(r.variant_tag.as_deref(), Some("bigendian"));
        assert_eq!(r.shortcode, "n64");
    }

    #[test]
    fn region_hints_for_sibling_pairs() {
        assert_eq!(detect_region_hint("Nintendo - Famicom").as_deref(), Some("famicom"));
        assert_eq!(
            detect_region_hint("Nintendo - Nintendo Entertainment System").as_deref(),
            Some("nes")
        );
        assert_eq!(
            detect_region_hint("Nintendo - Super Famicom").as_deref(),
            Some("superfamicom")
        );
        assert_eq!(detect_region_hint("NEC - TurboGrafx-16").as_deref(), Some("turbografx"));
        assert_eq!(detect_region_hint("NEC - TurboGrafx CD"), None);
        assert_eq!(detect_region_hint("Nintendo - Famicom Disk System"), None);
    }
}
