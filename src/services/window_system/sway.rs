use crate::error::{Result, SwitcherError};
use crate::events::{WindowGeometry, WindowId, WindowInfo, WindowType};
use serde::Deserialize;
use std::collections::HashSet;
use std::process::Command;

use super::command_stdout;
use super::r#trait::{WindowActuator, WindowSource};

const BACKEND: &str = "sway";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Node {
    id: i64,
    #[serde(rename = "type")]
    node_type: String,
    name: Option<String>,
    app_id: Option<String>,
    pid: Option<u32>,
    focused: bool,
    rect: Rect,
    window_properties: Option<WindowProperties>,
    nodes: Vec<Node>,
    floating_nodes: Vec<Node>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Rect {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WindowProperties {
    class: Option<String>,
    window_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Workspace {
    name: String,
    #[serde(default)]
    visible: bool,
}

impl Node {
    fn is_window(&self) -> bool {
        matches!(self.node_type.as_str(), "con" | "floating_con") && self.pid.is_some()
    }

    /// Нативные Wayland окна имеют app_id, XWayland - только WM_CLASS
    fn class(&self) -> String {
        self.app_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.window_properties.as_ref().and_then(|p| p.class.clone()))
            .unwrap_or_default()
    }

    fn window_type(&self) -> WindowType {
        match self.window_properties.as_ref().and_then(|p| p.window_type.as_deref()) {
            None | Some("normal") => WindowType::Normal,
            Some(_) => WindowType::Other,
        }
    }

    fn to_window_info(&self, on_active_workspace: bool) -> WindowInfo {
        let mut window = WindowInfo::new(WindowId::new(self.id.to_string()))
            .with_class(self.class())
            .with_title(self.name.clone().unwrap_or_default())
            .with_type(self.window_type())
            .with_active_workspace(on_active_workspace)
            .with_geometry(WindowGeometry {
                x: self.rect.x,
                y: self.rect.y,
                width: self.rect.width,
                height: self.rect.height,
            });
        if let Some(pid) = self.pid {
            window = window.with_pid(pid);
        }
        window
    }
}

/// Бэкенд для sway через swaymsg (IPC в JSON)
pub struct SwayBackend;

impl SwayBackend {
    pub fn new() -> Self {
        Self
    }

    fn swaymsg(args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("swaymsg");
        cmd.args(args);
        command_stdout(BACKEND, cmd)
    }

    fn tree(&self) -> Result<Node> {
        parse_json(&Self::swaymsg(&["-t", "get_tree", "-r"])?)
    }

    fn visible_workspaces(&self) -> Result<HashSet<String>> {
        let workspaces: Vec<Workspace> =
            parse_json(&Self::swaymsg(&["-t", "get_workspaces", "-r"])?)?;
        Ok(workspaces
            .into_iter()
            .filter(|w| w.visible)
            .map(|w| w.name)
            .collect())
    }
}

impl WindowSource for SwayBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn probe(&self) -> Result<()> {
        Self::swaymsg(&["-t", "get_version"]).map(|_| ())
    }

    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let tree = self.tree()?;
        let visible = self.visible_workspaces()?;
        Ok(collect_windows(&tree, &visible))
    }

    fn focused_window(&self) -> Result<Option<WindowId>> {
        Ok(find_focused(&self.tree()?))
    }
}

impl WindowActuator for SwayBackend {
    fn activate(&self, window: &WindowInfo) -> Result<()> {
        let criteria = format!("[con_id={}] focus", window.id);
        Self::swaymsg(&[&criteria]).map(|_| ())
    }

    fn set_attention(&self, window: &WindowInfo, on: bool) -> Result<()> {
        let state = if on { "enable" } else { "disable" };
        let command = format!("[con_id={}] urgent {}", window.id, state);
        Self::swaymsg(&[&command]).map(|_| ())
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(stdout: &str) -> Result<T> {
    serde_json::from_str(stdout)
        .map_err(|e| SwitcherError::backend(BACKEND, format!("некорректный JSON: {}", e)))
}

/// Обход дерева в порядке swaymsg: тайловые узлы, затем плавающие
fn collect_windows(root: &Node, visible: &HashSet<String>) -> Vec<WindowInfo> {
    fn walk(node: &Node, workspace: Option<&str>, visible: &HashSet<String>, out: &mut Vec<WindowInfo>) {
        let workspace = if node.node_type == "workspace" {
            node.name.as_deref()
        } else {
            workspace
        };

        if node.is_window() {
            let active = workspace.map_or(false, |name| visible.contains(name));
            out.push(node.to_window_info(active));
        }

        for child in node.nodes.iter().chain(node.floating_nodes.iter()) {
            walk(child, workspace, visible, out);
        }
    }

    let mut windows = Vec::new();
    walk(root, None, visible, &mut windows);
    windows
}

fn find_focused(node: &Node) -> Option<WindowId> {
    if node.focused && node.is_window() {
        return Some(WindowId::new(node.id.to_string()));
    }
    node.nodes
        .iter()
        .chain(node.floating_nodes.iter())
        .find_map(find_focused)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"{
      "id": 1, "type": "root", "name": "root",
      "nodes": [{
        "id": 3, "type": "output", "name": "eDP-1",
        "nodes": [
          {
            "id": 4, "type": "workspace", "name": "1",
            "nodes": [
              {"id": 10, "type": "con", "name": "Terminal", "app_id": "foot", "pid": 100,
               "focused": true, "rect": {"x": 0, "y": 0, "width": 960, "height": 1080}, "nodes": []},
              {"id": 11, "type": "con", "name": "Mozilla Firefox", "app_id": null, "pid": 101,
               "window_properties": {"class": "firefox", "window_type": "normal"}, "nodes": []}
            ],
            "floating_nodes": [
              {"id": 12, "type": "floating_con", "name": "Save As", "app_id": null, "pid": 101,
               "window_properties": {"class": "firefox", "window_type": "dialog"}, "nodes": []}
            ]
          },
          {
            "id": 5, "type": "workspace", "name": "2",
            "nodes": [
              {"id": 20, "type": "con", "name": "Other term", "app_id": "foot", "pid": 102, "nodes": []}
            ]
          }
        ]
      }]
    }"#;

    const WORKSPACES: &str = r#"[
      {"name": "1", "visible": true, "focused": true},
      {"name": "2", "visible": false, "focused": false}
    ]"#;

    fn visible() -> HashSet<String> {
        let workspaces: Vec<Workspace> = parse_json(WORKSPACES).unwrap();
        workspaces.into_iter().filter(|w| w.visible).map(|w| w.name).collect()
    }

    #[test]
    fn test_collect_windows_from_tree() {
        let tree: Node = parse_json(TREE).unwrap();
        let windows = collect_windows(&tree, &visible());

        let ids: Vec<&str> = windows.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "11", "12", "20"]);

        assert_eq!(windows[0].class, "foot");
        assert_eq!(windows[0].geometry.map(|g| g.width), Some(960));
        assert_eq!(windows[1].class, "firefox");
        assert_eq!(windows[2].window_type, WindowType::Other);
        assert!(windows[1].on_active_workspace);
        assert!(!windows[3].on_active_workspace);
    }

    #[test]
    fn test_dialog_is_not_a_slot_window() {
        let tree: Node = parse_json(TREE).unwrap();
        let firefox: Vec<_> = collect_windows(&tree, &visible())
            .into_iter()
            .filter(|w| w.on_active_workspace && w.matches_class("firefox"))
            .collect();

        assert_eq!(firefox.len(), 1);
        assert_eq!(firefox[0].id.as_str(), "11");
    }

    #[test]
    fn test_find_focused() {
        let tree: Node = parse_json(TREE).unwrap();
        assert_eq!(find_focused(&tree), Some(WindowId::new("10")));
    }

    #[test]
    fn test_invalid_json_is_backend_error() {
        let result: Result<Node> = parse_json("not json");
        assert!(matches!(result, Err(SwitcherError::Backend { backend: "sway", .. })));
    }
}
