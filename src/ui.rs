use crate::config::SimulationConfig;
use crate::debug;
use crate::grid::Grid;
use crate::power::{PowerVector, BASELINE_POWER};
use crate::simulation::{SimError, Simulation};
use crate::ticker::Ticker;
use egui::{Color32, ColorImage, Rect, TextureHandle, TextureOptions, Vec2};
use std::cell::{Cell as SharedFlag, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Events listed in the side panel
const RECENT_EVENTS_SHOWN: usize = 12;

/// Main application state
pub struct AutomatonApp {
    pub sim: Simulation,
    ticker: Ticker,
    /// Latest grid image produced by the grid observer, not yet uploaded
    pending_frame: Rc<RefCell<Option<ColorImage>>>,
    /// Mirrors the simulation's running state via the running observer
    running: Rc<SharedFlag<bool>>,
    texture: Option<TextureHandle>,
    /// Variance used by the Reset button
    pub reset_variance: u8,
    pub show_legend: bool,
    last_error: Option<String>,
}

/// Map a power profile onto an RGB color
pub fn power_color(power: PowerVector) -> Color32 {
    let [r, g, b] = power.to_rgb();
    Color32::from_rgb(r, g, b)
}

/// One pixel per cell, row-major
pub fn grid_image(grid: &Grid) -> ColorImage {
    let size = grid.size();
    let mut image = ColorImage::new([size.width, size.height], Color32::BLACK);
    for (pixel, cell) in image.pixels.iter_mut().zip(grid.cells()) {
        *pixel = power_color(cell.power);
    }
    image
}

impl AutomatonApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: SimulationConfig,
    ) -> Result<Self, SimError> {
        let mut sim = Simulation::new(config)?;

        let pending_frame = Rc::new(RefCell::new(None));
        let frame_sink = Rc::clone(&pending_frame);
        sim.on_grid_changed(move |grid| {
            *frame_sink.borrow_mut() = Some(grid_image(grid));
        });

        let running = Rc::new(SharedFlag::new(false));
        let running_flag = Rc::clone(&running);
        sim.on_running_changed(move |value| running_flag.set(value));

        sim.initialize()?;
        sim.start()?;

        Ok(Self {
            ticker: Ticker::for_simulation(&sim),
            sim,
            pending_frame,
            running,
            texture: None,
            reset_variance: BASELINE_POWER - 1,
            show_legend: true,
            last_error: None,
        })
    }

    fn report(&mut self, result: Result<(), SimError>) {
        if let Err(e) = result {
            tracing::warn!("simulation error: {e}");
            self.last_error = Some(e.to_string());
        }
    }

    /// Upload the latest observed grid, if any
    fn refresh_texture(&mut self, ctx: &egui::Context) {
        if let Some(image) = self.pending_frame.borrow_mut().take() {
            match self.texture.as_mut() {
                Some(texture) => texture.set(image, TextureOptions::NEAREST),
                None => {
                    self.texture = Some(ctx.load_texture("grid", image, TextureOptions::NEAREST));
                }
            }
        }
    }
}

impl eframe::App for AutomatonApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Duration::from_secs_f64(ctx.input(|i| i.time));
        let polled = self.ticker.poll(now, &mut self.sim).map(|_| ());
        self.report(polled);

        if let Some(wait) = self.ticker.until_due(now) {
            ctx.request_repaint_after(wait);
        }

        // Top panel with controls
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Power Automaton");

                ui.separator();

                let running = self.running.get();
                if ui.button(if running { "⏸ Stop" } else { "▶ Start" }).clicked() {
                    if running {
                        self.sim.stop();
                    } else {
                        let started = self.sim.start();
                        self.report(started);
                    }
                }

                if ui.button("Step").clicked() {
                    let stepped = self.sim.step().map(|_| ());
                    self.report(stepped);
                }

                ui.separator();

                egui::ComboBox::from_label("Variance")
                    .selected_text(self.reset_variance.to_string())
                    .show_ui(ui, |ui| {
                        for variance in 0..BASELINE_POWER {
                            ui.selectable_value(
                                &mut self.reset_variance,
                                variance,
                                variance.to_string(),
                            );
                        }
                    });

                if ui.button("Reset").clicked() {
                    let reset = self.sim.reset(self.reset_variance);
                    if reset.is_ok() {
                        debug::reset_stats();
                    }
                    self.report(reset);
                }

                ui.separator();

                ui.label(format!("Steps: {}", self.sim.steps()));
                ui.checkbox(&mut self.show_legend, "Legend");
            });

            if let Some(error) = &self.last_error {
                ui.colored_label(Color32::LIGHT_RED, error);
            }
        });

        // Side panel explaining the colors
        if self.show_legend {
            egui::SidePanel::right("legend_panel")
                .min_width(160.0)
                .show(ctx, |ui| {
                    ui.heading("What do the colors mean?");
                    ui.separator();

                    egui::ScrollArea::vertical().show(ui, |ui| {
                        ui.collapsing("Activity", |ui| {
                            let stats = debug::stats();
                            ui.label(format!("Steps: {}", stats.steps));
                            ui.label(format!(
                                "Mutations accepted: {:.1}%",
                                stats.acceptance_rate() * 100.0
                            ));
                            ui.label(format!(
                                "Fights: {} decided, {} ties",
                                stats.fights_decided, stats.fight_ties
                            ));
                            ui.separator();
                            for event in debug::recent_events(RECENT_EVENTS_SHOWN) {
                                ui.monospace(event);
                            }
                        });
                        ui.separator();

                        egui::Grid::new("legend_table").striped(true).show(ui, |ui| {
                            ui.label("Power value");
                            ui.label("Color");
                            ui.end_row();

                            for power in PowerVector::balanced_profiles() {
                                ui.label(power.to_string());
                                let (rect, _) = ui.allocate_exact_size(
                                    Vec2::new(40.0, 14.0),
                                    egui::Sense::hover(),
                                );
                                ui.painter().rect_filled(rect, 0.0, power_color(power));
                                ui.end_row();
                            }
                        });
                    });
                });
        }

        self.refresh_texture(ctx);

        // Central panel with the grid, scaled to fit
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(texture) = &self.texture else {
                ui.label("No grid yet");
                return;
            };

            let size = self.sim.config().size;
            let available = ui.available_size();
            let scale = (available.x / size.width as f32)
                .min(available.y / size.height as f32)
                .max(1.0);

            let (response, painter) = ui.allocate_painter(
                Vec2::new(scale * size.width as f32, scale * size.height as f32),
                egui::Sense::hover(),
            );
            let uv = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(texture.id(), response.rect, uv, Color32::WHITE);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Position, Size};
    use crate::power::Cell;

    #[test]
    fn test_power_color() {
        assert_eq!(power_color(PowerVector::new([9, 1, 5])), Color32::from_rgb(255, 28, 141));
    }

    #[test]
    fn test_grid_image_is_row_major() {
        let mut grid = Grid::filled(Size::new(3, 2), Cell::default()).unwrap();
        grid.set_cell(Position::new(2, 1), Cell::from([9, 5, 1])).unwrap();

        let image = grid_image(&grid);
        assert_eq!(image.size, [3, 2]);
        assert_eq!(image.pixels[5], power_color(PowerVector::new([9, 5, 1])));
        assert_eq!(image.pixels[0], power_color(PowerVector::BALANCED));
    }
}
