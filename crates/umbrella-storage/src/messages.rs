//! Display messages for the lending desk kiosk.
//!
//! Every string a student or operator sees (in WebSocket events and in API
//! responses) is defined here. The kiosk front end is Japanese, so all
//! messages are Japanese.
//!
//! # Usage
//!
//! ```
//! use umbrella_storage::messages::DisplayMessages;
//!
//! assert_eq!(DisplayMessages::BORROW_SUCCEEDED, "傘の貸出に成功しました");
//! assert!(DisplayMessages::retrying(2, 5).contains("(2/5)"));
//! ```

/// Display messages for reader, pipeline and lending outcomes.
pub struct DisplayMessages;

impl DisplayMessages {
    /// Borrow applied.
    pub const BORROW_SUCCEEDED: &'static str = "傘の貸出に成功しました";

    /// Return applied.
    pub const RETURN_SUCCEEDED: &'static str = "傘の返却に成功しました";

    /// Borrow rejected because the student already holds an umbrella.
    pub const ALREADY_BORROWED: &'static str = "既に傘を借りています";

    /// Return rejected because the student holds nothing.
    pub const NOTHING_BORROWED: &'static str = "借りている傘がありません";

    /// Reader acquired.
    pub const READER_STARTED: &'static str = "NFCリーダーを起動しました";

    /// Reader loop exited and released the reader.
    pub const READER_STOPPED: &'static str = "NFCリーダーを停止しました";

    /// A card was detected but its dump yielded no student ID.
    pub const TAG_UNREADABLE: &'static str =
        "カードを検出しましたが学籍番号の読み取りに失敗しました。処理を続行します。";

    /// First processing step.
    pub const PROCESSING_STARTED: &'static str = "処理を開始しました";

    /// Borrow step in progress.
    pub const BORROW_IN_PROGRESS: &'static str = "傘の貸出処理中...";

    /// Return step in progress.
    pub const RETURN_IN_PROGRESS: &'static str = "傘の返却処理中...";

    /// Confirmation step in progress.
    pub const CONFIRMING_RESULT: &'static str = "処理結果を確認中...";

    /// No borrow/return action configured when the card was read.
    pub const ACTION_NOT_SET: &'static str = "アクション（借りる/返す）が設定されていません";

    /// The reading carried no student ID.
    pub const RETRY_TAP: &'static str = "学籍番号を読み取れませんでした。もう一度お試しください。";

    /// Reply to a completed restart request.
    pub const READER_RESTARTED: &'static str = "NFCリーダーを再起動しました";

    /// API: action other than borrow/return.
    pub const INVALID_ACTION: &'static str = "無効なアクションです";

    /// API: request body without a student ID.
    pub const STUDENT_ID_REQUIRED: &'static str = "学籍番号が必要です";

    /// API: student ID with characters outside the allowed set.
    pub const INVALID_STUDENT_ID: &'static str = "学籍番号の形式が正しくありません";

    /// `reader_retrying` message for attempt `attempt` of `max_attempts`.
    pub fn retrying(attempt: u32, max_attempts: u32) -> String {
        format!(
            "NFCリーダーの初期化に失敗しました。再試行中 ({}/{})...",
            attempt, max_attempts
        )
    }

    /// `nfc_error` message once every acquisition attempt failed.
    pub fn acquisition_failed(reason: &str) -> String {
        format!("NFCリーダーの初期化に失敗しました: {}", reason)
    }

    /// `tag_detected` message for a readable card.
    pub fn tag_detected(student_id: &str) -> String {
        format!(
            "学生証を検出しました。学籍番号: {}。処理を開始します。",
            student_id
        )
    }

    /// Status-check step for `student_id`.
    pub fn checking_status(student_id: &str) -> String {
        format!("学籍番号 {} の情報を確認中...", student_id)
    }

    /// Processing failed with a store or internal error.
    pub fn processing_failed(reason: &str) -> String {
        format!("処理中にエラーが発生しました: {}", reason)
    }
}
