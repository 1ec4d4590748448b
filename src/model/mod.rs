pub mod board;
pub mod issue;
pub mod ticket;
