use crate::wire::HistoryRow;

/// One question/answer pair within a grouped conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteExchange {
    pub question: String,
    pub answer: String,
    pub video_link: Option<String>,
}

/// One conversation reassembled from flat persisted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConversation {
    pub chat_uid: String,
    pub title: String,
    pub exchanges: Vec<RemoteExchange>,
}

/// Groups flat history rows into conversations.
///
/// Rows arrive ordered by creation time across all conversations; groups are
/// keyed by `chat_uid` and appear in order of first arrival, with each
/// group's exchanges kept in arrival order. A rename updates every persisted
/// row of a conversation, so the latest row's title wins.
pub fn group_history(rows: Vec<HistoryRow>) -> Vec<RemoteConversation> {
    let mut grouped: Vec<RemoteConversation> = Vec::new();

    for row in rows {
        let exchange = RemoteExchange {
            question: row.question,
            answer: row.answer,
            video_link: row.video.filter(|video| !video.trim().is_empty()),
        };

        match grouped
            .iter()
            .position(|conversation| conversation.chat_uid == row.chat_uid)
        {
            Some(index) => {
                grouped[index].title = row.chat_id;
                grouped[index].exchanges.push(exchange);
            }
            None => grouped.push(RemoteConversation {
                chat_uid: row.chat_uid,
                title: row.chat_id,
                exchanges: vec![exchange],
            }),
        }
    }

    grouped
}
