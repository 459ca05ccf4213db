//! 影像栈浏览状态机
//!
//! 将一个病例的全部序列呈现为可翻页、可缩放、可拖动的影像栈。
//! 越界请求一律静默钳制，不产生错误。

use radio_core::Series;
use serde::Serialize;
use tracing::debug;

/// 最小缩放倍数
pub const MIN_ZOOM: f64 = 0.5;
/// 最大缩放倍数
pub const MAX_ZOOM: f64 = 5.0;
/// 带修饰键滚轮的缩放系数（每单位 deltaY）
pub const WHEEL_ZOOM_FACTOR: f64 = 0.002;
/// 缩放按钮步长
pub const BUTTON_ZOOM_STEP: f64 = 0.3;
/// 全屏显示时额外叠加的放大倍数，仅影响显示
pub const FULLSCREEN_MAGNIFICATION: f64 = 1.5;

/// 平面坐标（像素）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn minus(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

/// 浏览器状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerState {
    pub active_series: usize,
    pub slice: usize,
    pub zoom: f64,
    pub pan: Point,
    pub dragging: bool,
    pub fullscreen: bool,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            active_series: 0,
            slice: 0,
            zoom: 1.0,
            pan: Point::ORIGIN,
            dragging: false,
            fullscreen: false,
        }
    }
}

/// 浏览器输入事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerEvent {
    /// 选择序列
    SelectSeries(usize),
    /// 滚轮；`modifier` 为真时（Ctrl）缩放，否则翻层
    Wheel { delta_y: f64, modifier: bool },
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    PointerLeave,
    NextSlice,
    PreviousSlice,
    ZoomIn,
    ZoomOut,
    ResetView,
    EnterFullscreen,
    ExitFullscreen,
}

/// 影像栈浏览器
#[derive(Debug, Clone)]
pub struct StackViewer {
    series: Vec<Series>,
    state: ViewerState,
    /// 拖动开始时指针相对当前平移量的偏移
    drag_origin: Point,
}

impl StackViewer {
    pub fn new(series: Vec<Series>) -> Self {
        Self {
            series,
            state: ViewerState::default(),
            drag_origin: Point::ORIGIN,
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// 没有任何序列时显示占位内容，不接受输入
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn active_series(&self) -> Option<&Series> {
        self.series.get(self.state.active_series)
    }

    /// 当前序列的层数
    pub fn slice_count(&self) -> usize {
        self.active_series().map(Series::len).unwrap_or(0)
    }

    /// 当前显示的图像
    pub fn current_image(&self) -> Option<&str> {
        self.active_series()
            .and_then(|series| series.images.get(self.state.slice))
            .map(String::as_str)
    }

    /// 层面标签，如 “Coupe 3 / 12”
    pub fn slice_label(&self) -> Option<String> {
        let total = self.slice_count();
        (total > 0).then(|| format!("Coupe {} / {}", self.state.slice + 1, total))
    }

    /// 层面进度（0..=1），用于侧边进度条
    pub fn slice_progress(&self) -> f64 {
        match self.slice_count() {
            0 => 0.0,
            total => (self.state.slice + 1) as f64 / total as f64,
        }
    }

    /// 显示用的缩放倍数，全屏时叠加固定放大倍数
    pub fn display_scale(&self) -> f64 {
        if self.state.fullscreen {
            self.state.zoom * FULLSCREEN_MAGNIFICATION
        } else {
            self.state.zoom
        }
    }

    /// 显示用的平移量（在缩放后的坐标系中）
    pub fn display_translation(&self) -> Point {
        let scale = self.display_scale();
        Point::new(self.state.pan.x / scale, self.state.pan.y / scale)
    }

    /// 处理一个输入事件
    pub fn handle(&mut self, event: ViewerEvent) {
        if self.is_empty() {
            return;
        }

        match event {
            ViewerEvent::SelectSeries(index) => self.select_series(index),
            ViewerEvent::Wheel { delta_y, modifier } => {
                if !delta_y.is_finite() {
                    return;
                }
                if modifier {
                    self.set_zoom(self.state.zoom - delta_y * WHEEL_ZOOM_FACTOR);
                } else if delta_y > 0.0 {
                    self.step_slice(1);
                } else if delta_y < 0.0 {
                    self.step_slice(-1);
                }
            }
            ViewerEvent::PointerDown(pointer) => {
                if self.state.zoom > 1.0 {
                    self.state.dragging = true;
                    self.drag_origin = pointer.minus(self.state.pan);
                }
            }
            ViewerEvent::PointerMove(pointer) => {
                if self.state.dragging && self.state.zoom > 1.0 {
                    self.state.pan = pointer.minus(self.drag_origin);
                }
            }
            ViewerEvent::PointerUp | ViewerEvent::PointerLeave => {
                self.state.dragging = false;
            }
            ViewerEvent::NextSlice => self.step_slice(1),
            ViewerEvent::PreviousSlice => self.step_slice(-1),
            ViewerEvent::ZoomIn => self.set_zoom(self.state.zoom + BUTTON_ZOOM_STEP),
            ViewerEvent::ZoomOut => self.set_zoom(self.state.zoom - BUTTON_ZOOM_STEP),
            ViewerEvent::ResetView => self.reset_view(),
            ViewerEvent::EnterFullscreen => self.state.fullscreen = true,
            ViewerEvent::ExitFullscreen => self.state.fullscreen = false,
        }
    }

    /// 切换序列：层面归零，视图复位
    fn select_series(&mut self, index: usize) {
        let index = index.min(self.series.len() - 1);
        debug!("Viewer switching to series {}", index);
        self.state.active_series = index;
        self.state.slice = 0;
        self.reset_view();
    }

    fn step_slice(&mut self, delta: isize) {
        let total = self.slice_count();
        if total == 0 {
            return;
        }
        let target = self.state.slice as isize + delta;
        self.state.slice = target.clamp(0, total as isize - 1) as usize;
    }

    /// 缩放回到 1 倍及以下时结束拖动
    fn set_zoom(&mut self, zoom: f64) {
        self.state.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if self.state.zoom <= 1.0 {
            self.state.dragging = false;
        }
    }

    fn reset_view(&mut self) {
        self.state.zoom = 1.0;
        self.state.pan = Point::ORIGIN;
        self.state.dragging = false;
    }
}
