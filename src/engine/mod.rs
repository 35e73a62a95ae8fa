//! Core engine: the scan → classify pipeline behind every report.

pub mod scanner;

pub use scanner::Scanner;
