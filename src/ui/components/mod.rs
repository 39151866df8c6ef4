pub mod chat_area;
pub mod input_bar;
pub mod room_list;
pub mod status_panel;
