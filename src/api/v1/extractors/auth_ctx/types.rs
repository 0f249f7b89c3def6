/*
 * Responsibility
 * - Handler から見える「呼び出し元ユーザー」の型
 * - middleware が request extensions に格納し、handler はこの型だけを受け取る
 */

use uuid::Uuid;

/// 識別済みリクエストに付与されるコンテキスト
///
/// 権限は持たない。所有者チェック (author_id == user_id) は handler 側で行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthCtx {
    pub user_id: Uuid,
}

impl AuthCtx {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    pub fn owns(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id
    }
}
