//! Supported target architectures.
//!
//! Each entry pairs the sandbox's architecture name with the name the
//! node-style binary release train uses in its asset filenames.

/// A supported target architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arch {
    /// Architecture name as the sandboxed builder knows it.
    pub linux: &'static str,
    /// Architecture name as it appears in prebuilt release asset filenames.
    pub node: &'static str,
}

/// All architectures the generated manifest targets.
pub const SUPPORTED_ARCHES: [Arch; 4] = [
    Arch {
        linux: "x86_64",
        node: "x64",
    },
    Arch {
        linux: "i386",
        node: "ia32",
    },
    Arch {
        linux: "arm",
        node: "arm",
    },
    Arch {
        linux: "aarch64",
        node: "arm64",
    },
];

impl Arch {
    /// Look up an architecture by its sandbox name.
    pub fn by_linux(name: &str) -> Option<Arch> {
        SUPPORTED_ARCHES.iter().copied().find(|a| a.linux == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_supported_arches() {
        assert_eq!(SUPPORTED_ARCHES.len(), 4);
    }

    #[test]
    fn lookup_by_linux_name() {
        let arch = Arch::by_linux("x86_64").unwrap();
        assert_eq!(arch.node, "x64");
        assert!(Arch::by_linux("mips").is_none());
    }

    #[test]
    fn linux_names_are_unique() {
        for (i, a) in SUPPORTED_ARCHES.iter().enumerate() {
            for b in &SUPPORTED_ARCHES[i + 1..] {
                assert_ne!(a.linux, b.linux);
                assert_ne!(a.node, b.node);
            }
        }
    }
}
