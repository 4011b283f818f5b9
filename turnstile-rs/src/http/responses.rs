use serde::{Deserialize, Serialize};

use crate::store::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserForm {
    #[serde(default)]
    pub username: String,
}

/// Render the admin console: the user listing plus create/delete forms.
/// Usernames come from clients, so everything interpolated is escaped.
pub fn render_admin_page(users: &[User]) -> String {
    let mut rows = String::new();
    for user in users {
        rows.push_str(&format!(
            "<tr><td>{name}</td><td>{created}</td><td>\
             <form method=\"post\" action=\"/admin/users/delete\">\
             <input type=\"hidden\" name=\"username\" value=\"{name}\">\
             <button type=\"submit\">Delete</button></form></td></tr>\n",
            name = escape_html(&user.username),
            created = user.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>User Admin</title></head>\n<body>\n\
         <h1>Users</h1>\n\
         <table>\n<tr><th>Username</th><th>Created</th><th></th></tr>\n{rows}</table>\n\
         <h2>Create user</h2>\n\
         <form method=\"post\" action=\"/admin/users\">\n\
         <input name=\"username\" placeholder=\"username\">\n\
         <input name=\"password\" type=\"password\" placeholder=\"password\">\n\
         <button type=\"submit\">Create</button>\n\
         </form>\n</body>\n</html>\n"
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
