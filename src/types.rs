use std::collections::HashMap;
use tokio::sync::mpsc::Sender;

use crate::models::Session;

/// <user_id, Sender> — one cancel channel per running alert loop
pub type CancelMap = HashMap<String, Sender<bool>>;

/// <user_id, Session>
pub type SessionMap = HashMap<String, Session>;
