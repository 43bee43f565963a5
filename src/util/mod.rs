pub mod clock;
pub mod markup;
