// CLASSIFICATION: COMMUNITY
// Filename: source.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-03-02

//! Source acquisition: fetch the program text for a session, or fall back
//! to the built-in default. The pipeline must never start on empty input.
//!
//! Storage quirk, preserved on purpose: a present resource carries one
//! leading format-marker byte that is not program text, so resource content
//! starts at offset 1. The built-in default starts at offset 0.

use log::info;
use std::path::PathBuf;

/// Resource name conventionally holding the program text.
pub const DEFAULT_RESOURCE: &str = "tcc.py";

/// Program compiled when the resource is absent or empty. Exercises the
/// whole baseline symbol surface.
pub const DEFAULT_PROGRAM: &str = "\
extern int add(int a, int b);\n\
extern void msleep_ms(int ms);\n\
extern const char hello[];\n\
int fib(int n) {\n\
    if (n <= 2) {\n\
        return 1;\n\
    } else {\n\
        return fib(n-1) + fib(n-2);\n\
    }\n\
}\n\
\n\
int main(int n) {\n\
    printf(\"%s\\n\", hello);\n\
    msleep_ms(1000);\n\
    printf(\"fib(%d) = %d\\n\", n, fib(n));\n\
    printf(\"add(%d, %d) = %d\\n\", n, 2 * n, add(n, 2 * n));\n\
    msleep_ms(1000);\n\
    return 0;\n\
}\n";

/// Capability handing out the bytes of a named resource, or `None` when it
/// does not exist. The embedding supplies the real storage implementation.
pub trait SourceStore {
    fn read(&self, name: &str) -> Option<Vec<u8>>;
}

/// Where a session's program text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Stored resource; the leading marker byte has already been skipped.
    Resource,
    /// Built-in default, used verbatim.
    Builtin,
}

/// Program text ready for the pipeline. Never empty.
#[derive(Clone, Debug)]
pub struct ProgramSource {
    pub text: String,
    pub origin: SourceOrigin,
}

/// Obtain the session's program text from `store`, falling back to
/// [`DEFAULT_PROGRAM`] when the resource is missing, empty, or holds only
/// the marker byte.
pub fn acquire(store: &dyn SourceStore, name: &str) -> ProgramSource {
    match store.read(name) {
        Some(bytes) if bytes.len() > 1 => {
            info!("source: {} bytes from resource '{name}'", bytes.len() - 1);
            ProgramSource {
                // Offset 1: skip the storage format marker.
                text: String::from_utf8_lossy(&bytes[1..]).into_owned(),
                origin: SourceOrigin::Resource,
            }
        }
        _ => {
            info!("source: resource '{name}' missing or empty, using builtin");
            ProgramSource {
                text: DEFAULT_PROGRAM.to_string(),
                origin: SourceOrigin::Builtin,
            }
        }
    }
}

/// Hosted store backed by the filesystem, for workstation runs and tests.
#[cfg(not(target_os = "none"))]
pub struct FileStore {
    root: PathBuf,
}

#[cfg(not(target_os = "none"))]
impl FileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        FileStore { root: root.into() }
    }
}

#[cfg(not(target_os = "none"))]
impl SourceStore for FileStore {
    fn read(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.root.join(name)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MemStore(HashMap<String, Vec<u8>>);

    impl SourceStore for MemStore {
        fn read(&self, name: &str) -> Option<Vec<u8>> {
            self.0.get(name).cloned()
        }
    }

    fn store(entries: &[(&str, &[u8])]) -> MemStore {
        MemStore(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn missing_resource_falls_back_to_builtin() {
        let src = acquire(&store(&[]), "tcc.py");
        assert_eq!(src.origin, SourceOrigin::Builtin);
        assert_eq!(src.text, DEFAULT_PROGRAM);
    }

    #[test]
    fn empty_resource_falls_back_to_builtin() {
        let src = acquire(&store(&[("tcc.py", b"")]), "tcc.py");
        assert_eq!(src.origin, SourceOrigin::Builtin);
        assert_eq!(src.text, DEFAULT_PROGRAM);
    }

    #[test]
    fn marker_only_resource_falls_back_to_builtin() {
        let src = acquire(&store(&[("tcc.py", b"\x41")]), "tcc.py");
        assert_eq!(src.origin, SourceOrigin::Builtin);
    }

    #[test]
    fn resource_text_skips_leading_marker() {
        let src = acquire(&store(&[("tcc.py", b"\x41int main")]), "tcc.py");
        assert_eq!(src.origin, SourceOrigin::Resource);
        assert_eq!(src.text, "int main");
    }

    #[test]
    fn file_store_reads_named_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tcc.py"), b"\x00abc").unwrap();
        let fs = FileStore::new(dir.path());
        let src = acquire(&fs, "tcc.py");
        assert_eq!(src.text, "abc");
    }
}
