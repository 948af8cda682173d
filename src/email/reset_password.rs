use askama::Template;

use crate::email::Email;
use crate::models::user::User;

#[derive(Template)]
#[template(path = "reset-password.html")]
pub struct ResetPasswordEmail<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub reset_link: &'a str,
}

impl<'a> ResetPasswordEmail<'a> {
    pub fn for_user(user: &'a User, reset_link: &'a str) -> Self {
        Self {
            name: &user.name,
            email: &user.email,
            reset_link,
        }
    }
}

impl<'a> Email for ResetPasswordEmail<'a> {
    fn subject(&self) -> String {
        "Your Sick Fits Password Reset Token".to_owned()
    }

    fn address(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}
