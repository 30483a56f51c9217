//! Per-kind pattern tables.
//!
//! Each artifact kind is described entirely by data. Supporting a new kind
//! means adding a [`PatternTable`] entry to [`TABLES`].

use std::sync::LazyLock;

use regex::Regex;

use super::ArtifactKind;

/// Captures a declared name. The first participating capture group is the name.
pub struct CapturePattern {
    pub category: &'static str,
    pub pattern: &'static str,
}

/// Evidence that code is unfinished.
pub struct SignalPattern {
    pub label: &'static str,
    pub pattern: &'static str,
    /// Report the number of matches instead of a bare label.
    pub counted: bool,
}

/// A boolean structural fact, true when the pattern matches anywhere.
pub struct FactPattern {
    pub name: &'static str,
    pub pattern: &'static str,
}

pub struct PatternTable {
    pub kind: ArtifactKind,
    pub capabilities: &'static [CapturePattern],
    /// Names captured by `capabilities` that are really keywords.
    pub ignored_names: &'static [&'static str],
    /// Must expose a `tag` and a `text` group.
    pub marker: &'static str,
    pub signals: &'static [SignalPattern],
    pub facts: &'static [FactPattern],
}

pub const TABLES: &[PatternTable] = &[
    PatternTable {
        kind: ArtifactKind::Script,
        capabilities: &[
            CapturePattern {
                category: "class",
                pattern: r"\bclass\s+(\w+)",
            },
            CapturePattern {
                category: "function",
                pattern: r"\bfunction\s*\*?\s*(\w+)\s*\(",
            },
            CapturePattern {
                category: "function",
                pattern: r"\b(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*=>",
            },
            CapturePattern {
                category: "function",
                pattern: r"\b(\w+)\s*:\s*(?:async\s+)?function\b",
            },
            CapturePattern {
                category: "method",
                pattern: r"(?m)^[ \t]+(?:static\s+)?(?:async\s+)?(\w+)\s*\([^)\n]*\)\s*\{",
            },
            CapturePattern {
                category: "export",
                pattern: r"(?:module\.)?exports\.(\w+)|\bexport\s+(?:default\s+)?(?:async\s+)?(?:class\s+|function\s+|const\s+|let\s+|var\s+)?(\w+)",
            },
        ],
        ignored_names: &[
            "if", "for", "while", "switch", "catch", "with", "function", "return", "class",
            "default",
        ],
        marker: r"(?im)(?://|/\*)\s*(?P<tag>TODO|FIXME|HACK|XXX|NOTE)\b:?\s*(?P<text>.*?)\s*(?:\*/|$)",
        signals: &[
            SignalPattern {
                label: "Has unimplemented methods",
                pattern: r#"(?i)throw\s+new\s+Error\(\s*["'`]not implemented"#,
                counted: false,
            },
            SignalPattern {
                label: "possible stub functions",
                pattern: r"function\s+\w+\s*\([^)]*\)\s*\{[^}]{0,50}\}|=>\s*\{[^}]{0,50}\}",
                counted: true,
            },
        ],
        facts: &[],
    },
    PatternTable {
        kind: ArtifactKind::Definition,
        capabilities: &[
            CapturePattern {
                category: "class",
                pattern: r"(?m)^\s*class\s+(\w+)",
            },
            CapturePattern {
                category: "function",
                pattern: r"(?m)^\s*(?:async\s+)?def\s+(\w+)\s*\(",
            },
        ],
        ignored_names: &[],
        marker: r"(?im)#\s*(?P<tag>TODO|FIXME|HACK|XXX|NOTE)\b:?\s*(?P<text>.*)$",
        signals: &[
            SignalPattern {
                label: "Has unimplemented methods",
                pattern: r"\braise\s+NotImplementedError\b",
                counted: false,
            },
            SignalPattern {
                label: "possible stub functions",
                pattern: r"(?m)def\s+\w+\s*\([^)]*\)[^:\n]*:\s*\n\s+(?:pass|\.\.\.)\s*$",
                counted: true,
            },
        ],
        facts: &[],
    },
    PatternTable {
        kind: ArtifactKind::Interface,
        capabilities: &[
            CapturePattern {
                category: "class",
                pattern: r"\bclass\s+(\w+)",
            },
            CapturePattern {
                category: "struct",
                pattern: r"\bstruct\s+(\w+)",
            },
            CapturePattern {
                category: "protocol",
                pattern: r"\bprotocol\s+(\w+)",
            },
            CapturePattern {
                category: "function",
                pattern: r"\bfunc\s+(\w+)\s*[(<]",
            },
        ],
        ignored_names: &["func", "var", "let"],
        marker: r"(?im)//\s*(?P<tag>TODO|FIXME|HACK|XXX|NOTE)\b:?\s*(?P<text>.*)$",
        signals: &[SignalPattern {
            label: "Has unimplemented methods",
            pattern: r#"\bfatalError\(\s*"|\bpreconditionFailure\b"#,
            counted: false,
        }],
        facts: &[],
    },
    PatternTable {
        kind: ArtifactKind::Schema,
        capabilities: &[
            CapturePattern {
                category: "table",
                pattern: r"(?i)\bCREATE\s+(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:\w+\.)?(\w+)",
            },
            CapturePattern {
                category: "view",
                pattern: r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?(?:MATERIALIZED\s+)?VIEW\s+(?:\w+\.)?(\w+)",
            },
            CapturePattern {
                category: "function",
                pattern: r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?FUNCTION\s+(?:\w+\.)?(\w+)",
            },
            CapturePattern {
                category: "index",
                pattern: r"(?i)\bCREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)",
            },
        ],
        ignored_names: &[],
        marker: r"(?im)--\s*(?P<tag>TODO|FIXME|HACK|XXX|NOTE)\b:?\s*(?P<text>.*)$",
        signals: &[],
        facts: &[FactPattern {
            name: "has_seed_data",
            pattern: r"(?i)\bINSERT\s+INTO\b",
        }],
    },
];

pub struct CompiledTable {
    pub kind: ArtifactKind,
    pub capabilities: Vec<(&'static str, Regex)>,
    pub ignored_names: &'static [&'static str],
    pub marker: Regex,
    pub signals: Vec<(&'static SignalPattern, Regex)>,
    pub facts: Vec<(&'static str, Regex)>,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in analyzer pattern must compile")
}

static COMPILED: LazyLock<Vec<CompiledTable>> = LazyLock::new(|| {
    TABLES
        .iter()
        .map(|table| CompiledTable {
            kind: table.kind,
            capabilities: table
                .capabilities
                .iter()
                .map(|capture| (capture.category, compile(capture.pattern)))
                .collect(),
            ignored_names: table.ignored_names,
            marker: compile(table.marker),
            signals: table
                .signals
                .iter()
                .map(|signal| (signal, compile(signal.pattern)))
                .collect(),
            facts: table
                .facts
                .iter()
                .map(|fact| (fact.name, compile(fact.pattern)))
                .collect(),
        })
        .collect()
});

/// Compiled table for a kind. Every kind has exactly one table.
pub fn table_for(kind: ArtifactKind) -> &'static CompiledTable {
    COMPILED
        .iter()
        .find(|table| table.kind == kind)
        .unwrap_or_else(|| unreachable!("no pattern table for {kind}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_one_table() {
        for kind in ArtifactKind::ALL {
            let count = TABLES.iter().filter(|table| table.kind == kind).count();
            assert_eq!(count, 1, "{kind}");
            assert_eq!(table_for(kind).kind, kind);
        }
    }

    #[test]
    fn marker_patterns_expose_tag_and_text() {
        for table in COMPILED.iter() {
            let names: Vec<&str> = table.marker.capture_names().flatten().collect();
            assert!(names.contains(&"tag"), "{}", table.kind);
            assert!(names.contains(&"text"), "{}", table.kind);
        }
    }
}
