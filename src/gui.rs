use std::path::Path;

use eframe::egui;
use log::{debug, error, info, warn};
use rfd::FileDialog;
use serde::{Deserialize, Serialize};

use crate::commands::Command;
use crate::database::Database;
use crate::filter::{FilterSpec, KeywordField, MAX_RESULT_ROWS};
use crate::images;
use crate::session::{SearchOutcome, Session};

const TITLE_CLIP: usize = 90;
const AUTHORS_CLIP: usize = 60;

/// Persisted across runs via eframe storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub db_path: String,
    pub img_dir: String,
    pub rows_per_page: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            db_path: "papers.sqlite".to_string(),
            img_dir: "images".to_string(),
            rows_per_page: 20,
        }
    }
}

pub struct PaperBrowserApp {
    settings: AppSettings,

    // Filter inputs
    author_input: String,
    keyword_input: String,
    search_title: bool,
    search_abstract: bool,
    search_paper_text: bool,
    event_type: Option<String>,
    event_types: Vec<String>,

    session: Session,

    // Status messages
    status_message: String,
    error_message: String,

    // Exit confirmation
    confirm_exit: bool,
    allowed_to_close: bool,
}

impl PaperBrowserApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        egui_extras::install_image_loaders(&cc.egui_ctx);

        let settings: AppSettings = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, eframe::APP_KEY))
            .unwrap_or_default();

        let (db, error_message) = match Database::open(&settings.db_path) {
            Ok(db) => {
                info!("opened database {}", settings.db_path);
                (Some(db), String::new())
            }
            Err(e) => {
                error!("failed to open database {}: {}", settings.db_path, e);
                (
                    None,
                    format!("Cannot open database {}: {}", settings.db_path, e),
                )
            }
        };

        let session = Session::new(db, settings.rows_per_page);

        let mut app = PaperBrowserApp {
            author_input: String::new(),
            keyword_input: String::new(),
            search_title: true,
            search_abstract: false,
            search_paper_text: false,
            event_type: None,
            event_types: Vec::new(),
            session,
            settings,
            status_message: String::from("Ready"),
            error_message,
            confirm_exit: false,
            allowed_to_close: false,
        };

        // Show the unfiltered table right away, as long as a database opened.
        if app.session.has_database() {
            app.refresh_event_types();
            app.handle_search();
        }

        app
    }

    /// The single place where user actions meet their handlers.
    fn dispatch(&mut self, command: Command, ctx: &egui::Context) {
        match command {
            Command::Search => self.handle_search(),
            Command::FirstPage => self.session.first_page(),
            Command::PreviousPage => self.session.previous_page(),
            Command::NextPage => self.session.next_page(),
            Command::LastPage => self.session.last_page(),
            Command::GotoPage(page) => self.session.goto_page(page),
            Command::SetPageSize(size) => self.handle_set_page_size(size),
            Command::SelectRow(local_index) => self.handle_select_row(local_index),
            Command::ExportResults => self.handle_export(),
            Command::PickDatabase => self.handle_pick_database(),
            Command::PickImageDirectory => self.handle_pick_image_directory(),
            Command::OpenImage => self.handle_open_image(),
            Command::RequestExit => self.confirm_exit = true,
            Command::CancelExit => self.confirm_exit = false,
            Command::ConfirmExit => {
                self.confirm_exit = false;
                self.allowed_to_close = true;
                self.session.close_database();
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    fn current_filter(&self) -> FilterSpec {
        let mut keyword_fields = Vec::new();
        if self.search_title {
            keyword_fields.push(KeywordField::Title);
        }
        if self.search_abstract {
            keyword_fields.push(KeywordField::Abstract);
        }
        if self.search_paper_text {
            keyword_fields.push(KeywordField::PaperText);
        }

        FilterSpec {
            author_substring: self.author_input.trim().to_string(),
            keyword_substring: self.keyword_input.trim().to_string(),
            keyword_fields,
            event_type: self.event_type.clone(),
        }
    }

    fn handle_search(&mut self) {
        match self.session.search(&self.current_filter()) {
            Ok(SearchOutcome::Results { total, truncated }) => {
                self.status_message = if truncated {
                    format!(
                        "{} papers shown (more matched; result capped at {})",
                        total, MAX_RESULT_ROWS
                    )
                } else {
                    format!("{} papers found", total)
                };
                self.error_message.clear();
            }
            Ok(SearchOutcome::Empty) => {
                self.status_message = "No papers matched the current filters".to_string();
                self.error_message.clear();
            }
            Err(e) => {
                self.error_message = e.to_string();
                self.status_message.clear();
            }
        }
    }

    fn handle_set_page_size(&mut self, size: usize) {
        self.session.set_page_size(size);
        self.settings.rows_per_page = size.max(1);
    }

    fn handle_select_row(&mut self, local_index: usize) {
        if let Some(absolute) = self.session.select_row(local_index) {
            debug!("selected row {} of the result set", absolute);
        }
    }

    fn handle_export(&mut self) {
        if self.session.results().is_empty() {
            return;
        }

        if let Some(path) = FileDialog::new()
            .set_file_name(Session::default_export_name())
            .add_filter("CSV", &["csv"])
            .save_file()
        {
            match self.session.export_csv(&path) {
                Ok(count) => {
                    self.status_message =
                        format!("Exported {} papers to {}", count, path.display());
                    self.error_message.clear();
                }
                Err(e) => {
                    error!("export failed: {}", e);
                    self.error_message = e.to_string();
                    self.status_message.clear();
                }
            }
        }
    }

    fn handle_pick_database(&mut self) {
        if let Some(path) = FileDialog::new()
            .add_filter("SQLite database", &["sqlite", "db", "sqlite3"])
            .pick_file()
        {
            self.settings.db_path = path.to_string_lossy().to_string();
            self.reopen_database();
        }
    }

    fn reopen_database(&mut self) {
        match Database::open(&self.settings.db_path) {
            Ok(db) => {
                info!("opened database {}", self.settings.db_path);
                self.session.replace_database(Some(db));
                self.refresh_event_types();
                self.status_message = format!("Opened {}", self.settings.db_path);
                self.error_message.clear();
                self.handle_search();
            }
            Err(e) => {
                error!("failed to open database {}: {}", self.settings.db_path, e);
                self.session.replace_database(None);
                self.event_types.clear();
                self.event_type = None;
                self.error_message =
                    format!("Cannot open database {}: {}", self.settings.db_path, e);
                self.status_message.clear();
            }
        }
    }

    fn handle_pick_image_directory(&mut self) {
        if let Some(path) = FileDialog::new().pick_folder() {
            self.settings.img_dir = path.to_string_lossy().to_string();
            self.status_message = format!("Image folder: {}", self.settings.img_dir);
            self.error_message.clear();
        }
    }

    fn handle_open_image(&mut self) {
        let Some(row) = self.session.selected_row() else {
            return;
        };
        let img_file = row.img_file.clone();

        match images::resolve_image(Path::new(&self.settings.img_dir), &img_file) {
            Some(path) => {
                if let Err(e) = open::that(&path) {
                    error!("failed to open image {}: {}", path.display(), e);
                    self.error_message = format!("Failed to open image: {}", e);
                    self.status_message.clear();
                }
            }
            None => {
                self.error_message =
                    format!("Image {} is not in {}", img_file, self.settings.img_dir);
                self.status_message.clear();
            }
        }
    }

    fn refresh_event_types(&mut self) {
        match self.session.event_types() {
            Ok(types) => {
                if let Some(current) = &self.event_type {
                    if !types.contains(current) {
                        self.event_type = None;
                    }
                }
                self.event_types = types;
            }
            Err(e) => {
                warn!("failed to load event types: {}", e);
                self.event_types.clear();
                self.event_type = None;
            }
        }

        match self.session.paper_count() {
            Ok(count) => info!("database holds {} papers", count),
            Err(e) => warn!("failed to count papers: {}", e),
        }
    }

    fn filter_panel(&mut self, ui: &mut egui::Ui, commands: &mut Vec<Command>) {
        ui.add_space(4.0);
        ui.horizontal(|ui| {
            ui.heading("📚 Paper Browser");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("🚪 Exit").clicked() {
                    commands.push(Command::RequestExit);
                }
                if ui.button("🖼 Image folder…").clicked() {
                    commands.push(Command::PickImageDirectory);
                }
                if ui.button("🗄 Database…").clicked() {
                    commands.push(Command::PickDatabase);
                }
            });
        });

        ui.add_space(4.0);

        ui.horizontal(|ui| {
            ui.label("Author:");
            let author_edit = ui.text_edit_singleline(&mut self.author_input);
            ui.label("Keyword:");
            let keyword_edit = ui.text_edit_singleline(&mut self.keyword_input);

            if (author_edit.lost_focus() || keyword_edit.lost_focus())
                && ui.input(|i| i.key_pressed(egui::Key::Enter))
            {
                commands.push(Command::Search);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Search keyword in:");
            ui.checkbox(&mut self.search_title, KeywordField::Title.label());
            ui.checkbox(&mut self.search_abstract, KeywordField::Abstract.label());
            ui.checkbox(&mut self.search_paper_text, KeywordField::PaperText.label());

            ui.separator();

            ui.label("Event type:");
            egui::ComboBox::from_id_source("event_type")
                .selected_text(
                    self.event_type
                        .as_deref()
                        .unwrap_or("All event types")
                        .to_string(),
                )
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.event_type, None, "All event types");
                    for event_type in &self.event_types {
                        ui.selectable_value(
                            &mut self.event_type,
                            Some(event_type.clone()),
                            event_type.as_str(),
                        );
                    }
                });

            ui.separator();

            let can_search = self.session.has_database();
            if ui
                .add_enabled(can_search, egui::Button::new("🔍 Search"))
                .clicked()
            {
                commands.push(Command::Search);
            }
        });

        ui.add_space(4.0);
    }

    fn results_panel(&mut self, ui: &mut egui::Ui, commands: &mut Vec<Command>) {
        if self.session.results().is_empty() {
            ui.add_space(8.0);
            ui.label("Adjust the filters and press Search to list papers.");
            return;
        }

        let page = self.session.page();
        let range = page.page_range();
        let total = page.total_rows();

        ui.horizontal(|ui| {
            ui.heading(format!("{} papers", total));
            if self.session.results().truncated() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    format!("showing the first {} matches only", MAX_RESULT_ROWS),
                );
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("📤 Export CSV").clicked() {
                    commands.push(Command::ExportResults);
                }
            });
        });

        // Pagination bar
        ui.horizontal(|ui| {
            let on_first = page.current_page() == 1;
            let on_last = page.current_page() == page.total_pages();

            if ui
                .add_enabled(!on_first, egui::Button::new("⏮ First"))
                .clicked()
            {
                commands.push(Command::FirstPage);
            }
            if ui
                .add_enabled(!on_first, egui::Button::new("◀ Previous"))
                .clicked()
            {
                commands.push(Command::PreviousPage);
            }
            if ui
                .add_enabled(!on_last, egui::Button::new("Next ▶"))
                .clicked()
            {
                commands.push(Command::NextPage);
            }
            if ui
                .add_enabled(!on_last, egui::Button::new("Last ⏭"))
                .clicked()
            {
                commands.push(Command::LastPage);
            }

            ui.separator();

            ui.label("Page:");
            let mut selected_page = page.current_page();
            egui::ComboBox::from_id_source("page_select")
                .width(70.0)
                .selected_text(selected_page.to_string())
                .show_ui(ui, |ui| {
                    for candidate in 1..=page.total_pages() {
                        ui.selectable_value(&mut selected_page, candidate, candidate.to_string());
                    }
                });
            if selected_page != page.current_page() {
                commands.push(Command::GotoPage(selected_page));
            }
            ui.label(format!("of {}", page.total_pages()));

            ui.separator();

            ui.label("Rows per page:");
            let mut rows_per_page = page.page_size();
            ui.add(egui::DragValue::new(&mut rows_per_page).range(1..=500));
            if rows_per_page != page.page_size() {
                commands.push(Command::SetPageSize(rows_per_page));
            }

            ui.separator();

            ui.label(format!(
                "Showing {}–{} of {}",
                range.start + 1,
                range.end,
                total
            ));
        });

        ui.add_space(5.0);

        egui::ScrollArea::both()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("papers_grid")
                    .striped(true)
                    .spacing([12.0, 4.0])
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new("Row").strong());
                        ui.label(egui::RichText::new("PaperId").strong());
                        ui.label(egui::RichText::new("EventType").strong());
                        ui.label(egui::RichText::new("Title").strong());
                        ui.label(egui::RichText::new("Authors").strong());
                        ui.end_row();

                        let selected = self.session.selected_index();
                        for (local_index, row) in self.session.current_slice().iter().enumerate() {
                            let absolute = range.start + local_index + 1;
                            let is_selected = selected == Some(absolute);

                            ui.label(absolute.to_string());
                            ui.label(row.paper_id.to_string());
                            ui.label(&row.event_type);
                            if ui
                                .selectable_label(is_selected, clip(&row.title, TITLE_CLIP))
                                .clicked()
                            {
                                commands.push(Command::SelectRow(local_index));
                            }
                            ui.label(clip(&row.authors, AUTHORS_CLIP));
                            ui.end_row();
                        }
                    });
            });
    }

    fn detail_panel(&mut self, ui: &mut egui::Ui, commands: &mut Vec<Command>) {
        ui.add_space(4.0);
        ui.heading("Paper detail");
        ui.separator();

        let Some(row) = self.session.selected_row() else {
            ui.label("Select a row in the table to see the paper's detail.");
            return;
        };

        ui.label(egui::RichText::new(&row.title).strong().size(16.0));
        ui.label(format!("PaperId {} · {}", row.paper_id, row.event_type));
        ui.label(&row.authors);

        ui.add_space(6.0);
        ui.separator();

        match images::resolve_image(Path::new(&self.settings.img_dir), &row.img_file) {
            Some(path) => {
                let uri = format!("file://{}", path.display());
                ui.add(egui::Image::from_uri(uri).max_size(egui::vec2(340.0, 260.0)))
                    .on_hover_text(row.img_file.as_str());
                if ui.button("🖼 Open image").clicked() {
                    commands.push(Command::OpenImage);
                }
            }
            None => {
                if row.img_file.trim().is_empty() {
                    ui.label("No image for this paper.");
                } else {
                    ui.label(format!("Image {} not found.", row.img_file));
                }
            }
        }

        ui.add_space(6.0);
        ui.separator();

        ui.label(egui::RichText::new("Abstract").strong());
        egui::ScrollArea::vertical()
            .id_source("abstract_scroll")
            .max_height(160.0)
            .show(ui, |ui| {
                ui.label(&row.abstract_text);
            });

        ui.add_space(6.0);

        ui.label(egui::RichText::new("Paper text").strong());
        egui::ScrollArea::vertical()
            .id_source("paper_text_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.label(&row.paper_text);
            });
    }

    fn status_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if !self.status_message.is_empty() {
                ui.colored_label(egui::Color32::GREEN, &self.status_message);
            }
            if !self.error_message.is_empty() {
                ui.colored_label(egui::Color32::RED, &self.error_message);
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!(
                    "db: {}  ·  images: {}",
                    self.settings.db_path, self.settings.img_dir
                ));
            });
        });
    }

    fn exit_dialog(&mut self, ctx: &egui::Context, commands: &mut Vec<Command>) {
        egui::Window::new("Confirm exit")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label("Are you sure you want to exit?");
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        commands.push(Command::ConfirmExit);
                    }
                    if ui.button("No").clicked() {
                        commands.push(Command::CancelExit);
                    }
                });
            });
    }
}

impl eframe::App for PaperBrowserApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // The window close button routes through the same confirmation as
        // the exit button.
        if ctx.input(|i| i.viewport().close_requested()) && !self.allowed_to_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.confirm_exit = true;
        }

        let mut commands = Vec::new();

        egui::TopBottomPanel::top("filter_panel")
            .show(ctx, |ui| self.filter_panel(ui, &mut commands));
        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| self.status_panel(ui));
        egui::SidePanel::right("detail_panel")
            .min_width(360.0)
            .show(ctx, |ui| self.detail_panel(ui, &mut commands));
        egui::CentralPanel::default().show(ctx, |ui| self.results_panel(ui, &mut commands));

        if self.confirm_exit {
            self.exit_dialog(ctx, &mut commands);
        }

        for command in commands {
            self.dispatch(command, ctx);
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self.settings);
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max_chars).collect();
        format!("{}…", clipped)
    }
}

#[cfg(test)]
mod tests {
    use super::clip;

    #[test]
    fn clip_leaves_short_text_alone() {
        assert_eq!(clip("short title", 90), "short title");
    }

    #[test]
    fn clip_shortens_on_a_char_boundary() {
        let long = "x".repeat(100);
        let clipped = clip(&long, 90);
        assert_eq!(clipped.chars().count(), 91);
        assert!(clipped.ends_with('…'));
    }
}
