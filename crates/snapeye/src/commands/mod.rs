mod check;
mod compare;
mod init;
mod verify;

pub use self::check::check;
pub use self::compare::compare;
pub use self::init::init;
pub use self::verify::verify;
