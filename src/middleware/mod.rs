/*
 * Responsibility
 * - middleware の公開インターフェース
 * - app.rs からは各モジュールの apply(...) だけを呼ぶ
 */
pub mod cors;
pub mod http;
pub mod identity;
pub mod security_headers;
