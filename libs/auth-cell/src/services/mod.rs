pub mod account;
pub mod mailer;
pub mod password;
pub mod verification;

pub use account::AccountService;
pub use mailer::{LogMailer, Mailer};
pub use password::PasswordService;
pub use verification::EmailVerificationService;
