/// Commands sent from the view down to the chat network task.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Re-run session bootstrap after a failure.
    Bootstrap,
    SendMessage {
        room_id: String,
        content: String,
    },
    /// Staff opened a room: load its backlog, then mark it read.
    OpenRoom {
        room_id: String,
    },
    MarkRead {
        room_id: String,
    },
    /// Tear down the session and forget stored credentials.
    Logout,
    Shutdown,
}
