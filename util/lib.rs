/*!
This crate holds the small utilities shared by the other covermap crates.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod progress_counter;
