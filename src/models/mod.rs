pub mod accounts;
pub mod governance;
