//! Static language profiles used by the highlighter and the editor.

use serde::Serialize;

/// Static description of a language the editor supports.
#[derive(Debug, Serialize)]
pub struct LanguageProfile {
    /// Stable identifier (e.g. `"python"`).
    pub id: &'static str,
    /// Human readable name for the language selector.
    pub display_name: &'static str,
    /// File extensions mapped to this language, without the dot.
    pub extensions: &'static [&'static str],
    /// Reserved words highlighted as keywords.
    pub keywords: &'static [&'static str],
    /// Single-line comment marker, if the language has one.
    pub comment_marker: Option<&'static str>,
    /// Code placed in the editor when no problem-specific starter exists.
    pub starter_template: &'static str,
}

impl LanguageProfile {
    /// Returns `true` if `word` is one of this language's keywords.
    #[must_use]
    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(&word)
    }
}

/// Python.
pub static PYTHON: LanguageProfile = LanguageProfile {
    id: "python",
    display_name: "Python",
    extensions: &["py"],
    keywords: &[
        "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
        "elif", "else", "except", "False", "finally", "for", "from", "global", "if", "import",
        "in", "is", "lambda", "None", "nonlocal", "not", "or", "pass", "raise", "return",
        "True", "try", "while", "with", "yield",
    ],
    comment_marker: Some("#"),
    starter_template: "def solution():\n    # Write your code here\n    pass\n",
};

/// JavaScript.
pub static JAVASCRIPT: LanguageProfile = LanguageProfile {
    id: "javascript",
    display_name: "JavaScript",
    extensions: &["js", "mjs", "cjs"],
    keywords: &[
        "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
        "delete", "do", "else", "export", "extends", "false", "finally", "for", "function", "if",
        "import", "in", "instanceof", "let", "new", "null", "of", "return", "switch", "this",
        "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "yield",
    ],
    comment_marker: Some("//"),
    starter_template: "function solution() {\n  // Write your code here\n}\n",
};

/// Java.
pub static JAVA: LanguageProfile = LanguageProfile {
    id: "java",
    display_name: "Java",
    extensions: &["java"],
    keywords: &[
        "abstract", "boolean", "break", "byte", "case", "catch", "char", "class", "continue",
        "default", "do", "double", "else", "enum", "extends", "false", "final", "finally",
        "float", "for", "if", "implements", "import", "instanceof", "int", "interface", "long",
        "new", "null", "package", "private", "protected", "public", "return", "short", "static",
        "super", "switch", "this", "throw", "throws", "true", "try", "void", "while",
    ],
    comment_marker: Some("//"),
    starter_template: "public class Solution {\n    public static void main(String[] args) {\n        // Write your code here\n    }\n}\n",
};

/// C++.
pub static CPP: LanguageProfile = LanguageProfile {
    id: "cpp",
    display_name: "C++",
    extensions: &["cpp", "cc", "cxx", "hpp", "h"],
    keywords: &[
        "auto", "bool", "break", "case", "catch", "char", "class", "const", "continue",
        "default", "delete", "do", "double", "else", "enum", "false", "float", "for", "if",
        "include", "int", "long", "namespace", "new", "nullptr", "private", "protected",
        "public", "return", "short", "sizeof", "static", "std", "struct", "switch", "template",
        "this", "throw", "true", "try", "typename", "using", "vector", "void", "while",
    ],
    comment_marker: Some("//"),
    starter_template: "#include <iostream>\nusing namespace std;\n\nint main() {\n    // Write your code here\n    return 0;\n}\n",
};

/// Fallback used by the highlighter for unknown ids: strings and numbers only.
pub static PLAINTEXT: LanguageProfile = LanguageProfile {
    id: "plaintext",
    display_name: "Plain text",
    extensions: &["txt"],
    keywords: &[],
    comment_marker: None,
    starter_template: "",
};

/// Languages selectable in the editor, in selector order.
pub static LANGUAGES: [&LanguageProfile; 4] = [&PYTHON, &JAVASCRIPT, &JAVA, &CPP];

/// Looks up a selectable language by id, case-insensitively.
#[must_use]
pub fn profile(id: &str) -> Option<&'static LanguageProfile> {
    LANGUAGES
        .iter()
        .copied()
        .find(|p| p.id.eq_ignore_ascii_case(id))
}

/// Looks up a language for highlighting, falling back to [`PLAINTEXT`].
#[must_use]
pub fn profile_or_plain(id: &str) -> &'static LanguageProfile {
    profile(id).unwrap_or(&PLAINTEXT)
}

/// Guesses a language from a file extension (without the dot).
#[must_use]
pub fn from_extension(ext: &str) -> Option<&'static LanguageProfile> {
    LANGUAGES
        .iter()
        .copied()
        .find(|p| p.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Ids of all selectable languages.
#[must_use]
pub fn supported_ids() -> Vec<&'static str> {
    LANGUAGES.iter().map(|p| p.id).collect()
}
