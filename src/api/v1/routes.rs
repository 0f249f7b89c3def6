/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health, /recipes, /comments, /faqs, /users, /templates, /admin を並べる
 * - 認証の要否は extractor (AuthCtxExtractor / MaybeAuthCtx) 側で決まる
 */
use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

use crate::api::v1::handlers::{
    comments::{
        create_comment, delete_comment, list_comments, toggle_comment_like, update_comment,
    },
    faqs::{create_faq, delete_faq, list_faqs, update_faq},
    health::health,
    recipes::{
        create_recipe, delete_recipe, get_recipe, latest_recipes, like_counts, like_status,
        list_recipes, search_recipes, toggle_like, toggle_save, update_recipe,
    },
    templates::{
        admin_templates, create_template, delete_template, get_template, list_public,
        my_templates, save_template, update_template,
    },
    users::{create_user, created_recipes, get_user, saved_recipes, update_user},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(recipe_routes())
        .merge(comment_routes())
        .merge(faq_routes())
        .merge(user_routes())
        .merge(template_routes())
}

fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/latest", get(latest_recipes))
        .route("/recipes/search", get(search_recipes))
        .route("/recipes/likes", get(like_counts))
        .route(
            "/recipes/{id}",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/{id}/like", post(toggle_like))
        .route("/recipes/{id}/likes", get(like_status))
        .route("/recipes/{id}/save", post(toggle_save))
}

fn comment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/recipes/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/{id}", put(update_comment).delete(delete_comment))
        .route("/comments/{id}/like", post(toggle_comment_like))
}

fn faq_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/{id}/faqs", get(list_faqs).post(create_faq))
        .route("/faqs/{id}", put(update_faq).delete(delete_faq))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{user_id}", get(get_user).patch(update_user))
        .route("/users/{user_id}/recipes/created", get(created_recipes))
        .route("/users/{user_id}/recipes/saved", get(saved_recipes))
}

fn template_routes() -> Router<AppState> {
    Router::new()
        .route("/templates", post(create_template))
        .route("/templates/save", post(save_template))
        .route("/templates/public", get(list_public))
        .route("/templates/mine", get(my_templates))
        .route(
            "/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/admin/templates", get(admin_templates))
}
