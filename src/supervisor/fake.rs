use super::{ChildProcess, LaunchSpec, Launcher};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

/// Something a fake child was asked to do, tagged with its launch index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeAction {
    Launched(usize),
    QuitSent(usize),
    Terminated(usize),
    Waited(usize),
    Killed(usize),
}

#[derive(Default)]
struct FakeChildState {
    control_input: bool,
    exit: Option<i32>,
}

#[derive(Default)]
struct FakeState {
    launches: Vec<LaunchSpec>,
    children: Vec<FakeChildState>,
    actions: Vec<FakeAction>,
    failing_programs: Vec<String>,
    fail_stops: bool,
    fail_polls: bool,
    ignore_terminate: bool,
}

/// In-memory launcher used in tests; clones share state so a test can keep a
/// handle while the supervisor owns another.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Rc<RefCell<FakeState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful launches, in order.
    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.state.borrow().launches.clone()
    }

    pub fn actions(&self) -> Vec<FakeAction> {
        self.state.borrow().actions.clone()
    }

    /// Number of successful launches of `program`.
    pub fn launches_of(&self, program: &str) -> usize {
        self.state
            .borrow()
            .launches
            .iter()
            .filter(|spec| spec.program == program)
            .count()
    }

    /// Children that have not exited yet.
    pub fn live_count(&self) -> usize {
        self.state
            .borrow()
            .children
            .iter()
            .filter(|child| child.exit.is_none())
            .count()
    }

    /// Make every spawn of `program` fail as if it were not installed.
    pub fn fail_spawns_of(&self, program: &str) {
        self.state
            .borrow_mut()
            .failing_programs
            .push(program.to_string());
    }

    /// Undo `fail_spawns_of`.
    pub fn allow_spawns_of(&self, program: &str) {
        self.state
            .borrow_mut()
            .failing_programs
            .retain(|failing| failing != program);
    }

    /// Make quit, terminate and wait all return errors.
    pub fn fail_stops(&self, fail: bool) {
        self.state.borrow_mut().fail_stops = fail;
    }

    /// Make status polls return errors.
    pub fn fail_polls(&self, fail: bool) {
        self.state.borrow_mut().fail_polls = fail;
    }

    /// Children keep running after SIGTERM until killed.
    pub fn ignore_terminate(&self, ignore: bool) {
        self.state.borrow_mut().ignore_terminate = ignore;
    }

    /// Simulate child `index` exiting on its own with `code`.
    pub fn exit_child(&self, index: usize, code: i32) {
        if let Some(child) = self.state.borrow_mut().children.get_mut(index) {
            child.exit = Some(code);
        }
    }
}

impl Launcher for FakeLauncher {
    fn launch(&mut self, spec: &LaunchSpec) -> io::Result<Box<dyn ChildProcess>> {
        let mut state = self.state.borrow_mut();
        if state.failing_programs.contains(&spec.program) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", spec.program),
            ));
        }
        let index = state.children.len();
        state.launches.push(spec.clone());
        state.children.push(FakeChildState {
            control_input: spec.control_input,
            exit: None,
        });
        state.actions.push(FakeAction::Launched(index));
        Ok(Box::new(FakeChild {
            index,
            state: self.state.clone(),
        }))
    }
}

struct FakeChild {
    index: usize,
    state: Rc<RefCell<FakeState>>,
}

impl FakeChild {
    fn stop_step(&self, action: FakeAction) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_stops {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated failure"));
        }
        state.actions.push(action);
        Ok(())
    }
}

impl ChildProcess for FakeChild {
    fn id(&self) -> u32 {
        1000 + self.index as u32
    }

    fn exit_code(&mut self) -> io::Result<Option<i32>> {
        let state = self.state.borrow();
        if state.fail_polls {
            return Err(io::Error::other("simulated poll failure"));
        }
        Ok(state.children[self.index].exit)
    }

    fn send_quit(&mut self) -> io::Result<()> {
        if !self.state.borrow().children[self.index].control_input {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no control input",
            ));
        }
        self.stop_step(FakeAction::QuitSent(self.index))
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.stop_step(FakeAction::Terminated(self.index))?;
        let mut state = self.state.borrow_mut();
        if !state.ignore_terminate {
            let child = &mut state.children[self.index];
            child.exit.get_or_insert(-15);
        }
        Ok(())
    }

    fn wait(&mut self, _timeout: Option<Duration>) -> io::Result<Option<i32>> {
        self.stop_step(FakeAction::Waited(self.index))?;
        Ok(self.state.borrow().children[self.index].exit)
    }

    fn kill(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.actions.push(FakeAction::Killed(self.index));
        state.children[self.index].exit.get_or_insert(-9);
        Ok(())
    }
}
