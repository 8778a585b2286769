//! Renderer output error classification
//!
//! The renderer reports failures as plain text lines on stdout/stderr.
//! Known failure modes map to stable numeric codes: exact-match lines
//! first for an early return, then substring fragments.

/// Diagnostic lines the renderer prints verbatim on a failed generation
pub const KNOWN_FULL_ERRORS: &[(&str, u16)] = &[
    ("Settings is not valid to generate chart.", 1000),
    ("Error! No columns selected", 1001),
    ("Internal error while generating!", 1002),
    ("Out of Memory!", 1003),
    ("There was an error generating the image. Quitting.", 1004),
];

/// Fragments printed outside the renderer's generation path, usually when
/// the settings file itself is corrupt
pub const KNOWN_PARTIAL_ERRORS: &[(&str, u16)] = &[
    ("Premature end of file.", 2000),
    ("Content is not allowed in prolog.", 2001),
    ("[Fatal Error]", 2002),
    ("java.util.zip.ZipException: error in opening zip file", 2003),
];

/// Code used when the success sentinel is absent but no known error matched
pub const UNKNOWN_ERROR_CODE: u16 = 1005;

/// Message paired with [`UNKNOWN_ERROR_CODE`]
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred during chart generation";

/// Classify one renderer output line; 0 means no known error
#[must_use]
pub fn classify_line(line: &str) -> u16 {
    for (error, code) in KNOWN_FULL_ERRORS {
        if line == *error {
            return *code;
        }
    }
    for (error, code) in KNOWN_PARTIAL_ERRORS {
        if line.contains(error) {
            return *code;
        }
    }
    0
}
