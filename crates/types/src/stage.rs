use core::fmt;

/// One link of the boot chain, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stage {
    Firmware,
    Stage1,
    Stage2,
    Kernel,
}

impl Stage {
    /// All stages in the order control passes through them.
    pub const ALL: [Stage; 4] = [Stage::Firmware, Stage::Stage1, Stage::Stage2, Stage::Kernel];

    /// The stage control is handed to, or `None` for the terminal kernel.
    pub const fn next(self) -> Option<Stage> {
        match self {
            Stage::Firmware => Some(Stage::Stage1),
            Stage::Stage1 => Some(Stage::Stage2),
            Stage::Stage2 => Some(Stage::Kernel),
            Stage::Kernel => None,
        }
    }

    /// Position in the chain, starting at zero for the firmware.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Stage::Firmware => "firmware",
            Stage::Stage1 => "stage1",
            Stage::Stage2 => "stage2",
            Stage::Kernel => "kernel",
        }
    }

    /// File stem used for build artifacts (`<stem>.bin`, `<stem>.elf`).
    pub const fn file_stem(self) -> &'static str {
        match self {
            Stage::Firmware => "bios",
            Stage::Stage1 => "stage1_bootloader",
            Stage::Stage2 => "stage2_bootloader",
            Stage::Kernel => "kernel",
        }
    }

    /// Characters the stage writes to the firmware console, in order.
    pub const fn banner(self) -> &'static [u8] {
        match self {
            Stage::Firmware | Stage::Stage1 => b"",
            Stage::Stage2 => b"S2",
            Stage::Kernel => b"K",
        }
    }

    /// Parses either the stage name or its file stem.
    pub fn from_name(name: &str) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == name || stage.file_stem() == name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_walks_forward_and_terminates() {
        let mut seen = [Stage::Firmware; 4];
        let mut current = Some(Stage::Firmware);
        let mut n = 0;
        while let Some(stage) = current {
            seen[n] = stage;
            n += 1;
            current = stage.next();
        }
        assert_eq!(n, 4);
        assert_eq!(seen, Stage::ALL);
    }

    #[test]
    fn banners_spell_expected_console_output() {
        let mut out = [0u8; 3];
        let mut n = 0;
        for stage in Stage::ALL {
            for &b in stage.banner() {
                out[n] = b;
                n += 1;
            }
        }
        assert_eq!(&out[..n], b"S2K");
    }

    #[test]
    fn from_name_accepts_stems() {
        assert_eq!(Stage::from_name("bios"), Some(Stage::Firmware));
        assert_eq!(Stage::from_name("stage2"), Some(Stage::Stage2));
        assert_eq!(Stage::from_name("kernel"), Some(Stage::Kernel));
        assert_eq!(Stage::from_name("loader"), None);
    }
}
