use rgb::RGB8;

use super::command::number;
use super::command::ScreenSetting;
use super::command::WidgetKind;
use super::LcdError;
use crate::blit::blit;
use crate::blit::SourceRect;
use crate::buffer::PixelBuffer;
use crate::raster::TextRaster;

pub type ClientId = u64;

/// Horizontal bar lengths are given in fifths of a cell.
const BAR_STEPS_PER_CELL: i32 = 5;

#[derive(Debug)]
pub enum Widget {
    String {
        x: i32,
        y: i32,
        text: String,
        raster: Option<TextRaster>,
    },
    Title {
        text: String,
        raster: Option<TextRaster>,
    },
    HBar {
        x: i32,
        y: i32,
        length: i32,
    },
}

impl Widget {
    fn new(kind: WidgetKind) -> Self {
        match kind {
            WidgetKind::String => Widget::String {
                x: 0,
                y: 0,
                text: String::new(),
                raster: None,
            },
            WidgetKind::Title => Widget::Title {
                text: String::new(),
                raster: None,
            },
            WidgetKind::HBar => Widget::HBar {
                x: 0,
                y: 0,
                length: 0,
            },
        }
    }

    /// Apply `widget_set` arguments. Returns the text to rasterize, if any.
    fn set(&mut self, args: &[String]) -> Result<Option<String>, LcdError> {
        let arg = |idx: usize, name: &'static str| {
            args.get(idx)
                .map(String::as_str)
                .ok_or(LcdError::MissingArgument(name))
        };

        match self {
            Widget::String { x, y, text, raster } => {
                let new_x = number("x", arg(0, "x")?)?;
                let new_y = number("y", arg(1, "y")?)?;
                let new_text = arg(2, "text")?;

                *x = new_x;
                *y = new_y;
                if *text != new_text {
                    *text = new_text.to_string();
                    *raster = None;
                }

                Ok(Some(text.clone()).filter(|t| !t.is_empty() && raster.is_none()))
            }
            Widget::Title { text, raster } => {
                let new_text = arg(0, "text")?;
                if *text != new_text {
                    *text = new_text.to_string();
                    *raster = None;
                }

                Ok(Some(text.clone()).filter(|t| !t.is_empty() && raster.is_none()))
            }
            Widget::HBar { x, y, length } => {
                let new_x = number("x", arg(0, "x")?)?;
                let new_y = number("y", arg(1, "y")?)?;
                let new_length = number("length", arg(2, "length")?)?;

                *x = new_x;
                *y = new_y;
                *length = new_length;
                Ok(None)
            }
        }
    }

    fn attach(&mut self, for_text: &str, new: TextRaster) -> bool {
        match self {
            Widget::String { text, raster, .. } | Widget::Title { text, raster } => {
                if *text == for_text {
                    *raster = Some(new);
                    true
                } else {
                    false
                }
            }
            Widget::HBar { .. } => false,
        }
    }
}

#[derive(Debug)]
pub struct Screen {
    client: ClientId,
    id: String,
    priority: i32,
    name: String,
    duration: i32,
    widgets: Vec<(String, Widget)>,
}

impl Screen {
    fn new(client: ClientId, id: String) -> Self {
        Self {
            client,
            id,
            priority: 255,
            name: String::new(),
            duration: 32,
            widgets: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[cfg(test)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn duration(&self) -> i32 {
        self.duration
    }

    fn widget_mut(&mut self, widget: &str) -> Result<&mut Widget, LcdError> {
        self.widgets
            .iter_mut()
            .find(|(id, _)| id == widget)
            .map(|(_, w)| w)
            .ok_or_else(|| LcdError::UnknownWidget(widget.to_string()))
    }
}

/// Pixel geometry of the emulated character display.
#[derive(Debug, Clone, Copy)]
pub struct CellGeometry {
    pub width: usize,
    pub height: usize,
}

impl CellGeometry {
    fn origin(&self, x: i32, y: i32) -> (i32, i32) {
        let w = i32::try_from(self.width).unwrap_or(i32::MAX);
        let h = i32::try_from(self.height).unwrap_or(i32::MAX);
        (x.saturating_mul(w), y.saturating_mul(h))
    }
}

/// All screens of all connected clients, in creation order.
#[derive(Debug, Default)]
pub struct Screens {
    screens: Vec<Screen>,
}

impl Screens {
    fn position(&self, client: ClientId, screen: &str) -> Result<usize, LcdError> {
        self.screens
            .iter()
            .position(|s| s.client == client && s.id == screen)
            .ok_or_else(|| LcdError::UnknownScreen(screen.to_string()))
    }

    #[cfg(test)]
    pub fn screen(&self, client: ClientId, screen: &str) -> Result<&Screen, LcdError> {
        self.position(client, screen).map(|idx| &self.screens[idx])
    }

    fn screen_mut(&mut self, client: ClientId, screen: &str) -> Result<&mut Screen, LcdError> {
        let idx = self.position(client, screen)?;
        Ok(&mut self.screens[idx])
    }

    pub fn add_screen(&mut self, client: ClientId, screen: String) -> Result<(), LcdError> {
        if self.position(client, &screen).is_ok() {
            return Err(LcdError::DuplicateScreen(screen));
        }

        self.screens.push(Screen::new(client, screen));
        Ok(())
    }

    pub fn remove_screen(&mut self, client: ClientId, screen: &str) -> Result<(), LcdError> {
        let idx = self.position(client, screen)?;
        self.screens.remove(idx);
        Ok(())
    }

    pub fn configure_screen(
        &mut self,
        client: ClientId,
        screen: &str,
        settings: Vec<ScreenSetting>,
    ) -> Result<(), LcdError> {
        let screen = self.screen_mut(client, screen)?;

        for setting in settings {
            match setting {
                ScreenSetting::Priority(p) => screen.priority = p,
                ScreenSetting::Name(name) => screen.name = name,
                ScreenSetting::Duration(d) => screen.duration = d,
            }
        }

        tracing::debug!(
            client,
            screen = %screen.id,
            priority = screen.priority,
            name = %screen.name,
            duration = screen.duration,
            "Configured screen"
        );

        Ok(())
    }

    pub fn add_widget(
        &mut self,
        client: ClientId,
        screen: &str,
        widget: String,
        kind: WidgetKind,
    ) -> Result<(), LcdError> {
        let screen = self.screen_mut(client, screen)?;

        if screen.widgets.iter().any(|(id, _)| *id == widget) {
            return Err(LcdError::DuplicateWidget(widget));
        }

        screen.widgets.push((widget, Widget::new(kind)));
        Ok(())
    }

    pub fn remove_widget(&mut self, client: ClientId, screen: &str, widget: &str) -> Result<(), LcdError> {
        let screen = self.screen_mut(client, screen)?;
        let before = screen.widgets.len();
        screen.widgets.retain(|(id, _)| id != widget);

        if screen.widgets.len() == before {
            return Err(LcdError::UnknownWidget(widget.to_string()));
        }

        Ok(())
    }

    /// Update a widget. Returns the text that still needs a raster.
    pub fn set_widget(
        &mut self,
        client: ClientId,
        screen: &str,
        widget: &str,
        args: &[String],
    ) -> Result<Option<String>, LcdError> {
        self.screen_mut(client, screen)?.widget_mut(widget)?.set(args)
    }

    /// Store a raster made for `text`, unless the widget changed meanwhile.
    pub fn attach_raster(
        &mut self,
        client: ClientId,
        screen: &str,
        widget: &str,
        text: &str,
        raster: TextRaster,
    ) -> bool {
        match self.screen_mut(client, screen).and_then(|s| s.widget_mut(widget)) {
            Ok(w) => w.attach(text, raster),
            Err(_) => false,
        }
    }

    /// Drop every screen of `client`. Returns how many were removed.
    pub fn remove_client(&mut self, client: ClientId) -> usize {
        let before = self.screens.len();
        self.screens.retain(|s| s.client != client);
        before - self.screens.len()
    }

    /// Paint all widgets of all screens into `layer`.
    pub fn redraw(&self, layer: &mut PixelBuffer, cell: CellGeometry, bar_color: RGB8) {
        layer.clear();

        for screen in &self.screens {
            for (_, widget) in &screen.widgets {
                match widget {
                    Widget::String {
                        x,
                        y,
                        raster: Some(raster),
                        ..
                    } => {
                        let (px, py) = cell.origin(*x, *y);
                        blit(layer, raster, px, py, SourceRect::whole(raster), raster.transparent());
                    }
                    Widget::Title {
                        raster: Some(raster),
                        ..
                    } => {
                        blit(layer, raster, 0, 0, SourceRect::whole(raster), raster.transparent());
                    }
                    Widget::HBar { x, y, length } => {
                        draw_bar(layer, cell, *x, *y, *length, bar_color);
                    }
                    Widget::String { raster: None, .. } | Widget::Title { raster: None, .. } => {}
                }
            }
        }
    }
}

fn draw_bar(layer: &mut PixelBuffer, cell: CellGeometry, x: i32, y: i32, length: i32, color: RGB8) {
    let (px, py) = cell.origin(x, y);
    let cell_width = i32::try_from(cell.width).unwrap_or(i32::MAX);
    let cell_height = i32::try_from(cell.height).unwrap_or(i32::MAX);
    let width = length.max(0).saturating_mul(cell_width) / BAR_STEPS_PER_CELL;

    for yo in 0..cell_height {
        for xo in 0..width {
            layer.set(px.saturating_add(xo), py.saturating_add(yo), color);
        }
    }
}
