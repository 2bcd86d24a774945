use crate::geometry::{Bounds, Corner, Point};
use crate::object::{ObjectId, OverlayObject, Shape, TextShape};
use crate::raster::{self, Flattened};
use std::collections::VecDeque;

/// Side length of the square selection handles drawn on the active object's corners.
pub const HANDLE_SIZE: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    ObjectAdded(ObjectId),
    ObjectRemoved(ObjectId),
    ObjectModified(ObjectId),
    Cleared,
    TextEditingEntered(ObjectId),
    TextEditingExited(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Enter,
    Escape,
    SelectAll,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransformKind {
    Move { last: Point },
    Resize { anchor: Point },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    target: ObjectId,
    kind: TransformKind,
}

/// Retained-mode overlay canvas.
///
/// Holds objects in z-order (first is bottom-most), tracks the active
/// object and the text editing session, and queues [`SurfaceEvent`]s for the
/// mounted tool to consume.
#[derive(Debug, Clone)]
pub struct Surface {
    width: f32,
    height: f32,
    objects: Vec<OverlayObject>,
    next_id: u64,
    active: Option<ObjectId>,
    editing: Option<ObjectId>,
    transform: Option<Transform>,
    events: VecDeque<SurfaceEvent>,
    revision: u64,
}

impl Surface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            objects: Vec::new(),
            next_id: 0,
            active: None,
            editing: None,
            transform: None,
            events: VecDeque::new(),
            revision: 0,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Bumped on every visible change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn add(&mut self, shape: Shape) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        self.objects.push(OverlayObject { id, shape, selectable: true });
        self.events.push_back(SurfaceEvent::ObjectAdded(id));
        self.touch();
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<OverlayObject> {
        let index = self.objects.iter().position(|object| object.id == id)?;
        let removed = self.objects.remove(index);

        if self.active == Some(id) {
            self.active = None;
        }
        if self.editing == Some(id) {
            self.editing = None;
        }
        if self.transform.is_some_and(|transform| transform.target == id) {
            self.transform = None;
        }

        self.events.push_back(SurfaceEvent::ObjectRemoved(id));
        self.touch();
        Some(removed)
    }

    /// Remove every object and reset selection, editing and transform state.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.active = None;
        self.editing = None;
        self.transform = None;
        self.events.push_back(SurfaceEvent::Cleared);
        self.touch();
    }

    pub fn get(&self, id: ObjectId) -> Option<&OverlayObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    /// Mutable access counts as a change for [`revision`](Self::revision).
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut OverlayObject> {
        let index = self.objects.iter().position(|object| object.id == id)?;
        self.touch();
        self.objects.get_mut(index)
    }

    pub fn text(&self, id: ObjectId) -> Option<&TextShape> {
        self.get(id).and_then(|object| object.shape.as_text())
    }

    pub fn text_mut(&mut self, id: ObjectId) -> Option<&mut TextShape> {
        self.get_mut(id).and_then(|object| object.shape.as_text_mut())
    }

    /// Objects bottom to top.
    pub fn objects(&self) -> &[OverlayObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn bounds_of(&self, id: ObjectId) -> Option<Bounds> {
        self.get(id).map(OverlayObject::bounds)
    }

    pub fn contains_point(&self, id: ObjectId, point: Point) -> bool {
        self.get(id).is_some_and(|object| object.contains_point(point))
    }

    /// Topmost object under `point`.
    pub fn find_target(&self, point: Point) -> Option<ObjectId> {
        self.objects.iter().rev().find(|object| object.contains_point(point)).map(|object| object.id)
    }

    /// Every object under `point`, bottom to top.
    pub fn objects_at(&self, point: Point) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|object| object.contains_point(point))
            .map(|object| object.id)
            .collect()
    }

    pub fn active(&self) -> Option<ObjectId> {
        self.active
    }

    pub fn set_active(&mut self, id: Option<ObjectId>) {
        let id = id.filter(|id| self.get(*id).is_some());
        if self.active != id {
            self.active = id;
            self.touch();
        }
    }

    pub fn editing(&self) -> Option<ObjectId> {
        self.editing
    }

    /// Start editing a text object. Returns `false` for anything that is not text.
    pub fn enter_editing(&mut self, id: ObjectId) -> bool {
        if self.text(id).is_none() {
            return false;
        }
        if self.editing == Some(id) {
            return true;
        }

        self.exit_editing();
        self.editing = Some(id);
        self.active = Some(id);
        self.events.push_back(SurfaceEvent::TextEditingEntered(id));
        self.touch();
        tracing::debug!(object = id.raw(), "entered text editing");
        true
    }

    /// End the current editing session, if any, and return the edited object.
    pub fn exit_editing(&mut self) -> Option<ObjectId> {
        let id = self.editing.take()?;
        if let Some(text) = self.text_mut(id) {
            text.clear_selection();
        }
        self.events.push_back(SurfaceEvent::TextEditingExited(id));
        self.touch();
        tracing::debug!(object = id.raw(), "exited text editing");
        Some(id)
    }

    pub fn select_all(&mut self) {
        if let Some(id) = self.editing {
            if let Some(text) = self.text_mut(id) {
                text.select_all();
            }
        }
    }

    /// Feed a key to the editing session. Returns whether it was consumed.
    pub fn handle_key(&mut self, key: KeyInput) -> bool {
        let Some(id) = self.editing else {
            return false;
        };

        if key == KeyInput::Escape {
            self.exit_editing();
            return true;
        }

        let Some(text) = self.text_mut(id) else {
            return false;
        };

        match key {
            KeyInput::Char(ch) => {
                let mut buffer = [0; 4];
                text.insert(ch.encode_utf8(&mut buffer));
            }
            KeyInput::Enter => text.insert("\n"),
            KeyInput::Backspace => text.backspace(),
            KeyInput::Delete => text.delete_forward(),
            KeyInput::Left => text.move_left(),
            KeyInput::Right => text.move_right(),
            KeyInput::Home => text.move_home(),
            KeyInput::End => text.move_end(),
            KeyInput::SelectAll => text.select_all(),
            KeyInput::Escape => {}
        }

        true
    }

    /// Corner handle of the active object under `point`.
    pub fn handle_at(&self, point: Point) -> Option<Corner> {
        let object = self.get(self.active?)?;
        if !object.selectable {
            return None;
        }

        let bounds = object.bounds();
        Corner::ALL.into_iter().find(|corner| {
            let handle = bounds.corner(*corner);
            (point.x - handle.x).abs() <= HANDLE_SIZE / 2.0
                && (point.y - handle.y).abs() <= HANDLE_SIZE / 2.0
        })
    }

    /// Start moving or resizing via the built-in selection handles.
    ///
    /// A corner handle of the active object wins over the object body. A hit
    /// on a selectable body makes that object active. Returns whether a
    /// transform started.
    pub fn begin_transform(&mut self, point: Point) -> bool {
        if let (Some(active), Some(corner)) = (self.active, self.handle_at(point)) {
            let resizable = self.get(active).is_some_and(|object| !object.shape.is_text());
            let kind = match (resizable, self.bounds_of(active)) {
                (true, Some(bounds)) => TransformKind::Resize { anchor: bounds.corner(corner.opposite()) },
                _ => TransformKind::Move { last: point },
            };
            self.transform = Some(Transform { target: active, kind });
            return true;
        }

        let Some(target) = self.find_target(point) else {
            return false;
        };
        if !self.get(target).is_some_and(|object| object.selectable) {
            return false;
        }

        self.set_active(Some(target));
        self.transform = Some(Transform { target, kind: TransformKind::Move { last: point } });
        true
    }

    pub fn is_transforming(&self) -> bool {
        self.transform.is_some()
    }

    pub fn update_transform(&mut self, point: Point) {
        let Some(transform) = self.transform else {
            return;
        };

        match transform.kind {
            TransformKind::Move { last } => {
                let (dx, dy) = (point.x - last.x, point.y - last.y);
                if let Some(object) = self.get_mut(transform.target) {
                    object.shape.translate(dx, dy);
                }
                self.transform =
                    Some(Transform { kind: TransformKind::Move { last: point }, ..transform });
            }
            TransformKind::Resize { anchor } => {
                if let Some(rect) =
                    self.get_mut(transform.target).and_then(|object| object.shape.as_rect_mut())
                {
                    rect.set_frame(Bounds::from_corners(anchor, point));
                }
            }
        }
    }

    pub fn end_transform(&mut self) -> Option<ObjectId> {
        let transform = self.transform.take()?;
        self.events.push_back(SurfaceEvent::ObjectModified(transform.target));
        Some(transform.target)
    }

    /// Drain queued events, oldest first.
    pub fn take_events(&mut self) -> Vec<SurfaceEvent> {
        self.events.drain(..).collect()
    }

    /// Flatten every object onto a transparent raster `scale` pixels per unit.
    pub fn rasterize(&self, scale: f32) -> Flattened {
        raster::rasterize(self, scale)
    }
}
