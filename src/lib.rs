// Peertone: tone scoring for peer-evaluation comments
//
// This is the library root. analysis holds the scoring pipeline, oracle the
// swappable polarity sources behind it, web the HTTP surface the
// learning-platform plugin talks to.

pub mod analysis;
pub mod config;
pub mod oracle;
pub mod output;

#[cfg(feature = "web")]
pub mod web;
