use crate::types::{Classification, RegionalMode};
use anyhow::Result;
use regex::Regex;

/// Canonical display names per shortcode, used for the final target
/// naming regardless of which pattern produced the match.
const DISPLAY_TABLE: &[(&str, &str)] = &[
    ("3do", "3DO Interactive Multiplayer"),
    ("amiga", "Commodore Amiga"),
    ("amstradcpc", "Amstrad CPC"),
    ("apple2", "Apple II"),
    ("arcade", "Arcade (FinalBurn Neo)"),
    ("atari2600", "Atari 2600"),
    ("atari5200", "Atari 5200"),
    ("atari7800", "Atari 7800"),
    ("atari800", "Atari 8-bit Family"),
    ("atarijaguar", "Atari Jaguar"),
    ("atarijaguarcd", "Atari Jaguar CD"),
    ("atarilynx", "Atari Lynx"),
    ("atarist", "Atari ST"),
    ("atarixe", "Atari XE"),
    ("atomiswave", "Atomiswave Arcade"),
    ("c64", "Commodore 64"),
    ("cannonball", "Cannonball (OutRun Engine)"),
    ("coco", "TRS-80 Color Computer"),
    ("coleco", "ColecoVision"),
    ("colecovision", "ColecoVision"),
    ("dragon32", "Dragon Data"),
    ("dreamcast", "Sega Dreamcast"),
    ("fds", "Famicom Disk System"),
    ("famicom", "Nintendo Famicom"),
    ("gamegear", "Sega Game Gear"),
    ("gb", "Game Boy"),
    ("gba", "Game Boy Advance"),
    ("gbc", "Game Boy Color"),
    ("gc", "GameCube"),
    ("genesis", "Sega Genesis"),
    ("gizmondo", "Tiger Gizmondo"),
    ("intellivision", "Mattel Intellivision"),
    ("macintosh", "Apple Macintosh"),
    ("mastersystem", "Sega Master System"),
    ("megadrive", "Sega Mega Drive"),
    ("msx", "MSX"),
    ("n3ds", "Nintendo 3DS"),
    ("n64", "Nintendo 64"),
    ("n64dd", "Nintendo 64DD"),
    ("nds", "Nintendo DS"),
    ("neogeo", "Neo Geo"),
    ("neogeocd", "Neo Geo CD"),
    ("nes", "Nintendo Entertainment System"),
    ("ngp", "Neo Geo Pocket"),
    ("ngpc", "Neo Geo Pocket Color"),
    ("odyssey2", "Magnavox Odyssey 2"),
    ("othello", "Othello Multivision"),
    ("pc", "PC (IBM Compatible)"),
    ("pc98", "NEC PC-98"),
    ("pcengine", "PC Engine"),
    ("pcenginecd", "PC Engine CD"),
    ("pokemini", "Pokemon Mini"),
    ("pokitto", "Pokitto"),
    ("ps2", "PlayStation 2"),
    ("ps3", "PlayStation 3"),
    ("ps4", "PlayStation 4"),
    ("psp", "PlayStation Portable"),
    ("psvita", "PlayStation Vita"),
    ("psx", "PlayStation"),
    ("saturn", "Sega Saturn"),
    ("sega32x", "Sega 32X"),
    ("segacd", "Sega CD"),
    ("sfc", "Super Famicom"),
    ("sg1000", "Sega SG-1000"),
    ("snes", "Super Nintendo Entertainment System"),
    ("supergrafx", "PC Engine SuperGrafx"),
    ("supervision", "Watara Supervision"),
    ("trs80", "TRS-80"),
    ("turbografx", "TurboGrafx-16"),
    ("turbografxcd", "TurboGrafx-16 CD"),
    ("unknown", "Unknown Good Tool Collection"),
    ("vectrex", "GCE Vectrex"),
    ("virtualboy", "Virtual Boy"),
    ("wii", "Wii"),
    ("wiiu", "Wii U"),
    ("wonderswan", "Bandai WonderSwan"),
    ("wonderswancolor", "Bandai WonderSwan Color"),
    ("x1", "Sharp X1"),
    ("x68000", "Sharp X68000"),
    ("xbox", "Microsoft Xbox"),
    ("xbox360", "Microsoft Xbox 360"),
    ("zxspectrum", "ZX Spectrum"),
];

/// Disc add-ons and disk systems are never merged into their base
/// platform, in either mode.
const ALWAYS_SEPARATE: &[(&str, &str)] = &[
    (r"(?i)Family Computer.*Disk.*System", "fds"),
    (r"(?i)Famicom.*Disk.*System", "fds"),
    (r"(?i)Nintendo 64DD", "n64dd"),
    (r"(?i)Sega.?CD", "segacd"),
    (r"(?i)Mega.?CD", "segacd"),
    (r"(?i)PC Engine.*CD", "pcenginecd"),
    (r"(?i)TurboGrafx.*CD", "turbografxcd"),
];

/// Regional-mode split driven by the classifier's region hint.
const REGIONAL_SPLITS: &[(&str, &str)] = &[
    ("superfamicom", "sfc"),
    ("famicom", "famicom"),
    ("snes", "snes"),
    ("nes", "nes"),
    ("turbografx", "turbografx"),
    ("pcengine", "pcengine"),
];

/// Maps a classified platform to its final target shortcode and display
/// name, according to the configured regional preference.
pub struct RegionalResolver {
    mode: RegionalMode,
    always_separate: Vec<(Regex, &'static str)>,
}

impl RegionalResolver {
    pub fn new(mode: RegionalMode) -> Result<Self> {
        let always_separate = ALWAYS_SEPARATE
            .iter()
            .map(|(pattern, shortcode)| Ok((Regex::new(pattern)?, *shortcode)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { mode, always_separate })
    }

    pub fn mode(&self) -> RegionalMode {
        self.mode
    }

    /// Final (shortcode, display_name) for one classified directory.
    /// The folder name is still consulted for the always-separate scan
    /// because disc variants share a base classification (e.g. a
    /// `Sega CD` set classifies as `segacd` already, but `PC Engine CD`
    /// classifies as `pcengine`).
    pub fn resolve(&self, folder_name: &str, classification: &Classification) -> (String, String) {
        for (pattern, shortcode) in &self.always_separate {
            if pattern.is_match(folder_name) {
                return (shortcode.to_string(), self.display_name(shortcode, classification));
            }
        }

        let shortcode = match self.mode {
            RegionalMode::Consolidated => classification.shortcode.clone(),
            RegionalMode::Regional => classification
                .region_hint
                .as_deref()
                .and_then(|hint| {
                    REGIONAL_SPLITS
                        .iter()
                        .find(|(h, _)| *h == hint)
                        .map(|(_, sc)| sc.to_string())
                })
                .unwrap_or_else(|| classification.shortcode.clone()),
        };
        let display = self.display_name(&shortcode, classification);
        (shortcode, display)
    }

    fn display_name(&self, shortcode: &str, classification: &Classification) -> String {
        if self.mode == RegionalMode::Consolidated {
            let annotated = match shortcode {
                "nes" => Some("Nintendo Entertainment System (includes Famicom)"),
                "snes" => Some("Super Nintendo Entertainment System (includes Super Famicom)"),
                "pcengine" => Some("PC Engine (includes TurboGrafx-16)"),
                _ => None,
            };
            if let Some(name) = annotated {
                return name.to_string();
            }
        }
        DISPLAY_TABLE
            .iter()
            .find(|(sc, _)| *sc == shortcode)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| classification.display_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FolderClassifier;

    fn resolve(mode: RegionalMode, folder: &str) -> (String, String) {
        let classifier = FolderClassifier::new(true).unwrap();
        let c = classifier.classify(folder).unwrap();
        RegionalResolver::new(mode).unwrap().resolve(folder, &c)
    }

    #[test]
    fn consolidated_mode_merges_famicom_into_nes() {
        let (sc, display) = resolve(RegionalMode::Consolidated, "Nintendo - Famicom (Retool)");
        assert_eq!(sc, "nes");
        assert_eq!(display, "Nintendo Entertainment System (includes Famicom)");

        let (sc, _) = resolve(
            RegionalMode::Consolidated,
            "Nintendo - Nintendo Entertainment System",
        );
        assert_eq!(sc, "nes");
    }

    #[test]
    fn regional_mode_splits_sibling_platforms() {
        let (sc, display) = resolve(RegionalMode::Regional, "Nintendo - Famicom (Retool)");
        assert_eq!(sc, "famicom");
        assert_eq!(display, "Nintendo Famicom");

        let (sc, _) = resolve(RegionalMode::Regional, "Nintendo - Nintendo Entertainment System");
        assert_eq!(sc, "nes");

        let (sc, display) = resolve(RegionalMode::Regional, "Nintendo - Super Famicom");
        assert_eq!(sc, "sfc");
        assert_eq!(display, "Super Famicom");

        let (sc, _) = resolve(RegionalMode::Regional, "NEC - TurboGrafx-16");
        assert_eq!(sc, "turbografx");
    }

    #[test]
    fn disk_systems_stay_separate_in_both_modes() {
        for mode in [RegionalMode::Consolidated, RegionalMode::Regional] {
            let (sc, display) = resolve(mode, "Nintendo - Family Computer Disk System");
            assert_eq!(sc, "fds");
            assert_eq!(display, "Famicom Disk System");

            let (sc, _) = resolve(mode, "NEC - PC Engine CD & TurboGrafx CD");
            assert_eq!(sc, "pcenginecd");

            let (sc, _) = resolve(mode, "Nintendo - Nintendo 64DD");
            assert_eq!(sc, "n64dd");
        }
    }

    #[test]
    fn unknown_shortcodes_keep_the_classifier_display_name() {
        let classifier = FolderClassifier::new(true).unwrap();
        let c = classifier.classify("GoodVBOY v1.0").unwrap();
        let r = RegionalResolver::new(RegionalMode::Consolidated).unwrap();
        let (sc, display) = r.resolve("GoodVBOY v1.0", &c);
        assert_eq!(sc, "unknown");
        // "unknown" is in the display table.
        assert_eq!(display, "Unknown Good Tool Collection");
    }
}
