//! KiCad Format Detection
//!
//! Sniffs the header of a design file to decide which extractor applies.
//! Only the S-expression formats (KiCad 6 and later) are extracted; the
//! legacy `EESchema` and `PCBNEW` text formats are recognised so they can be
//! rejected with a clear error instead of a parse failure.

/// Kind of design file, judged from its first token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignFormat {
    /// `(kicad_sch ...)`
    Schematic,
    /// `(kicad_pcb ...)`
    Pcb,
    /// `EESchema Schematic File Version N`
    LegacySchematic,
    /// `PCBNEW-BOARD Version N`
    LegacyPcb,
}

impl DesignFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignFormat::Schematic => "KiCad schematic",
            DesignFormat::Pcb => "KiCad board",
            DesignFormat::LegacySchematic => "legacy EESchema schematic",
            DesignFormat::LegacyPcb => "legacy PCBNEW board",
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, DesignFormat::LegacySchematic | DesignFormat::LegacyPcb)
    }
}

/// KiCad release a file was written by, from its `(version YYYYMMDD)` stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KicadVersion {
    /// Older than 6.0 (pre-release S-expression files)
    Unknown,
    Modern6,
    Modern7,
    Modern8,
    Modern9,
}

impl KicadVersion {
    pub fn from_date(date: u32) -> Self {
        if date >= 20241017 {
            KicadVersion::Modern9
        } else if date >= 20231120 {
            KicadVersion::Modern8
        } else if date >= 20221018 {
            KicadVersion::Modern7
        } else if date >= 20211014 {
            KicadVersion::Modern6
        } else {
            KicadVersion::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KicadVersion::Unknown => "KiCad (unknown version)",
            KicadVersion::Modern6 => "KiCad 6",
            KicadVersion::Modern7 => "KiCad 7",
            KicadVersion::Modern8 => "KiCad 8",
            KicadVersion::Modern9 => "KiCad 9",
        }
    }
}

/// Detect the design format from file content.
pub fn detect_format(content: &str) -> Option<DesignFormat> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();

    if trimmed.starts_with("EESchema") {
        return Some(DesignFormat::LegacySchematic);
    }
    if trimmed.starts_with("PCBNEW") {
        return Some(DesignFormat::LegacyPcb);
    }

    let head = trimmed.strip_prefix('(')?.trim_start();
    let keyword: String = head
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .collect();
    match keyword.as_str() {
        "kicad_sch" => Some(DesignFormat::Schematic),
        "kicad_pcb" => Some(DesignFormat::Pcb),
        _ => None,
    }
}

/// The `(version YYYYMMDD)` stamp near the top of a modern file.
pub fn detect_version(content: &str) -> Option<KicadVersion> {
    let start = content.find("(version ")? + "(version ".len();
    let digits: String = content[start..]
        .chars()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().map(KicadVersion::from_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_modern() {
        assert_eq!(
            detect_format("(kicad_sch (version 20231120))"),
            Some(DesignFormat::Schematic)
        );
        assert_eq!(
            detect_format("\n  ( kicad_pcb (version 20240108))"),
            Some(DesignFormat::Pcb)
        );
        assert_eq!(detect_format("(kicad_symbol_lib)"), None);
        assert_eq!(detect_format(""), None);
    }

    #[test]
    fn test_detect_legacy() {
        let sch = detect_format("EESchema Schematic File Version 4\nLIBS:power\n").unwrap();
        assert_eq!(sch, DesignFormat::LegacySchematic);
        assert!(sch.is_legacy());
        assert_eq!(
            detect_format("PCBNEW-BOARD Version 1 date 2019"),
            Some(DesignFormat::LegacyPcb)
        );
    }

    #[test]
    fn test_detect_version() {
        assert_eq!(
            detect_version("(kicad_sch (version 20231120) (generator eeschema))"),
            Some(KicadVersion::Modern8)
        );
        assert_eq!(
            detect_version("(kicad_pcb (version 20211014))"),
            Some(KicadVersion::Modern6)
        );
        assert_eq!(detect_version("(kicad_pcb)"), None);
    }
}
