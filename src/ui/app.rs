use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent, Role};

use super::components::{chat_area, input_bar, room_list, status_panel};
use super::state::{ChatState, ConnectionStatus, View};

pub struct ChatApp {
    state: ChatState,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        Self {
            state: ChatState::new(),
            command_sender,
            event_receiver,
        }
    }

    fn handle_network_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.state.apply_event(event);
        }
    }

    fn send_command(&self, command: ChatCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to network: {err}");
        }
    }

    fn submit_input(&mut self) {
        if let Some(command) = self.state.compose_outbound() {
            self.send_command(command);
        }
    }

    fn render_customer(&mut self, ctx: &egui::Context) {
        let (open, unread) = match &self.state.view {
            View::Customer(view) => (view.open, view.unread),
            _ => return,
        };

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Support");
                let label = match (open, unread) {
                    (true, _) => "Close chat".to_string(),
                    (false, 0) => "Open chat".to_string(),
                    (false, n) => format!("Open chat ({n})"),
                };
                if ui.button(label).clicked() {
                    if open {
                        self.state.close_widget();
                    } else if let Some(command) = self.state.open_widget() {
                        self.send_command(command);
                    }
                }
            });
            ui.separator();

            if !open {
                ui.label("Questions about an order? Open the chat to talk to our staff.");
                return;
            }

            let input_height = 36.0;
            ui.allocate_ui(
                egui::vec2(ui.available_width(), ui.available_height() - input_height),
                |ui| chat_area::render(ui, self.state.visible_messages(), Role::Customer),
            );
            ui.separator();
            let enabled = self.state.connection == ConnectionStatus::Connected;
            if input_bar::render(ui, &mut self.state.input_text, enabled) {
                self.submit_input();
            }
        });
    }

    fn render_staff(&mut self, ctx: &egui::Context) {
        let clicked = match &self.state.view {
            View::Staff(view) => {
                let mut clicked = None;
                egui::SidePanel::left("room_list")
                    .min_width(220.0)
                    .show(ctx, |ui| {
                        clicked = room_list::render(ui, &view.rooms, view.open_room.as_deref());
                    });
                clicked
            }
            _ => return,
        };

        if let Some(room_id) = clicked {
            if let Some(command) = self.state.open_room(&room_id) {
                self.send_command(command);
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(room_id) = self.state.current_room_id().map(str::to_owned) else {
                ui.centered_and_justified(|ui| ui.label("Select a conversation"));
                return;
            };
            ui.heading(format!("Room {room_id}"));
            ui.separator();

            let input_height = 36.0;
            ui.allocate_ui(
                egui::vec2(ui.available_width(), ui.available_height() - input_height),
                |ui| chat_area::render(ui, self.state.visible_messages(), Role::Employee),
            );
            ui.separator();
            let enabled = self.state.connection == ConnectionStatus::Connected;
            if input_bar::render(ui, &mut self.state.input_text, enabled) {
                self.submit_input();
            }
        });
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_network_events();

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            status_panel::render(ui, &self.state);
        });

        match self.state.role() {
            Some(Role::Customer) => self.render_customer(ctx),
            Some(Role::Employee) => self.render_staff(ctx),
            None => {
                let mut retry = false;
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Shop support chat");
                    ui.separator();
                    match &self.state.last_error {
                        Some(error) => {
                            ui.label(error);
                            retry = ui.button("Retry").clicked();
                        }
                        None => {
                            ui.spinner();
                        }
                    }
                });
                if retry {
                    self.state.last_error = None;
                    self.send_command(ChatCommand::Bootstrap);
                }
            }
        }

        // Events arrive from another task; poll for them.
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
