use axum::response::Html;

const LOGIN_PAGE: &str = include_str!("../../static/login.html");
const REGISTER_PAGE: &str = include_str!("../../static/register.html");

pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

pub async fn register_page() -> Html<&'static str> {
    Html(REGISTER_PAGE)
}
