pub mod form;
pub mod prelude;
pub mod remote;
pub mod signup;
