pub mod filetypes;
pub mod scan;
