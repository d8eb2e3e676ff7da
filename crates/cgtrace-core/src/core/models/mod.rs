pub mod residue;
pub mod trajectory;
