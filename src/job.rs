//! ジョブテーブル: ジョブとプロセスのインメモリ台帳。
//!
//! スロット 0 はフォアグラウンドジョブ専用、1 以降がバックグラウンドスロット。
//! 空きスロットは `None` で表現する（元設計の「pgid == 0 は空き」という
//! 不変条件を Rust の `Option` でそのまま表したもの）。
//!
//! このテーブルへのアクセスは [`crate::signals::enter_blocked`] で得た
//! ブロック済みクリティカルセクションの中からのみ行うこと — SIGCHLD
//! ハンドラ ([`crate::reaper`]) と同時に読み書きされるため。

/// 単一プロセスの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Stopped,
    Finished,
}

/// 正常終了 / シグナル停止を区別する終了コードのタグ付き表現。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

impl ExitStatus {
    fn from_raw(status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            ExitStatus::Exited(libc::WEXITSTATUS(status))
        } else {
            ExitStatus::Signaled(libc::WTERMSIG(status))
        }
    }

    /// 従来のシェル終了コード規約（正常終了はそのまま、シグナル終了は 128+N）。
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited(c) => *c,
            ExitStatus::Signaled(s) => 128 + s,
        }
    }
}

/// パイプラインの 1 ステージに対応するプロセスレコード。
#[derive(Debug)]
pub struct Process {
    pub pid: libc::pid_t,
    pub state: ProcState,
    /// `state == Finished` のときのみ `Some`。
    pub exit_status: Option<ExitStatus>,
}

/// 集約されたジョブ状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Finished,
}

/// ジョブレコード。パイプラインを構成する全プロセスと、そのジョブに固有の
/// 端末属性スナップショットを保持する。
#[derive(Debug)]
pub struct Job {
    pub pgid: libc::pid_t,
    pub processes: Vec<Process>,
    /// 各ステージの argv を `" | "` で連結したテキスト表現。
    pub command: String,
    pub tmodes: libc::termios,
    pub notified: bool,
}

impl Job {
    /// §3 の集約規則: RUNNING > STOPPED > FINISHED。
    fn aggregate(&self) -> JobState {
        if self.processes.iter().any(|p| p.state == ProcState::Running) {
            JobState::Running
        } else if self.processes.iter().all(|p| p.state == ProcState::Finished) {
            JobState::Finished
        } else {
            JobState::Stopped
        }
    }

    /// パイプライン終了コード規約: 最後のプロセスの `ExitStatus`
    /// （exited/signaled の区別を保ったまま）。
    fn last_exit_status(&self) -> ExitStatus {
        self.processes
            .last()
            .and_then(|p| p.exit_status)
            .unwrap_or(ExitStatus::Exited(0))
    }
}

/// ジョブスロットの配列。インデックス 0 が予約されたフォアグラウンドスロット。
pub struct JobTable {
    slots: Vec<Option<Job>>,
}

impl JobTable {
    pub fn new() -> Self {
        // スロット 0 を先に確保しておく（常にフォアグラウンド専用）。
        Self { slots: vec![None] }
    }

    /// 空きスロットを確保する。既存の空きスロット(インデックス ≥ 1)を再利用し、
    /// なければ配列を 1 つ伸ばす。
    pub fn alloc_job(&mut self) -> usize {
        for (i, slot) in self.slots.iter().enumerate().skip(1) {
            if slot.is_none() {
                return i;
            }
        }
        self.slots.push(None);
        self.slots.len() - 1
    }

    /// `j = 0` (フォアグラウンド) もしくは新規バックグラウンドスロットにジョブを登録する。
    pub fn add_job(&mut self, pgid: libc::pid_t, bg: bool, tmodes: libc::termios) -> usize {
        let j = if bg { self.alloc_job() } else { 0 };
        self.slots[j] = Some(Job {
            pgid,
            processes: Vec::new(),
            command: String::new(),
            tmodes,
            notified: false,
        });
        j
    }

    /// ジョブ `j` に RUNNING なプロセスを追加し、コマンド文字列へ argv を連結する。
    pub fn add_proc(&mut self, j: usize, pid: libc::pid_t, argv: &[String]) {
        let job = self.slots[j].as_mut().expect("add_proc: free slot");
        if !job.command.is_empty() {
            job.command.push_str(" | ");
        }
        job.command.push_str(&argv.join(" "));
        job.processes.push(Process {
            pid,
            state: ProcState::Running,
            exit_status: None,
        });
    }

    /// 前提: `state(j) == Finished`。スロットを解放する。
    pub fn del_job(&mut self, j: usize) {
        let job = self.slots[j].take().expect("del_job: already free");
        debug_assert_eq!(job.aggregate(), JobState::Finished, "del_job: job not finished");
    }

    /// 前提: `to` が空きスロットであること。内容をそのまま移し、`from` を空にする。
    pub fn move_job(&mut self, from: usize, to: usize) {
        assert!(self.slots[to].is_none(), "move_job: destination not free");
        self.slots[to] = self.slots[from].take();
    }

    /// 現在の集約状態を返す（副作用なし）。
    pub fn state(&self, j: usize) -> Option<JobState> {
        self.slots[j].as_ref().map(Job::aggregate)
    }

    /// `state(j) == Finished` のとき、`ExitStatus`（exited/signaled の区別を
    /// 保ったまま）を返しスロットを解放する。それ以外では `None` を返し、
    /// 何もしない。
    pub fn take_if_finished(&mut self, j: usize) -> Option<ExitStatus> {
        let finished = self.slots[j].as_ref().map(Job::aggregate) == Some(JobState::Finished);
        if finished {
            let status = self.slots[j].as_ref().unwrap().last_exit_status();
            self.del_job(j);
            Some(status)
        } else {
            None
        }
    }

    /// `job_state(j, &status)`: 集約状態を返し、FINISHED ならスロットを解放して
    /// `ExitStatus` を同時に返す。
    pub fn job_state(&mut self, j: usize) -> (JobState, Option<ExitStatus>) {
        let st = self.state(j).expect("job_state: free slot");
        if st == JobState::Finished {
            let status = self.take_if_finished(j).expect("job_state: race on finished slot");
            (st, Some(status))
        } else {
            (st, None)
        }
    }

    pub fn job_cmd(&self, j: usize) -> &str {
        &self.slots[j].as_ref().expect("job_cmd: free slot").command
    }

    pub fn pgid(&self, j: usize) -> libc::pid_t {
        self.slots[j].as_ref().expect("pgid: free slot").pgid
    }

    pub fn tmodes(&self, j: usize) -> libc::termios {
        self.slots[j].as_ref().expect("tmodes: free slot").tmodes
    }

    pub fn set_tmodes(&mut self, j: usize, tmodes: libc::termios) {
        self.slots[j].as_mut().expect("set_tmodes: free slot").tmodes = tmodes;
    }

    pub fn is_free(&self, j: usize) -> bool {
        j >= self.slots.len() || self.slots[j].is_none()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 空きでないスロットのインデックスを、ジョブ番号の小さい順に列挙する。
    pub fn occupied_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
    }

    /// `j < 0` (ここでは `None`) のときに選ばれる「最も大きい、FINISHED でない
    /// スロット」を返す。存在しなければ `None`。
    pub fn highest_unfinished(&self) -> Option<usize> {
        self.occupied_indices()
            .rev()
            .find(|&i| self.state(i) != Some(JobState::Finished))
    }

    /// SIGCHLD ハンドラから呼ばれる: `waitpid` が返した `(pid, raw_status)` を
    /// 該当するプロセスに反映する。ジョブ側に集約状態フィールドは持たせず、
    /// `state()`/`job_state()` 呼び出し時に常に再計算するため、ここでは
    /// プロセスの更新だけで十分。対応するプロセスが見つからなければ何もしない。
    pub fn mark_pid(&mut self, pid: libc::pid_t, raw_status: libc::c_int) {
        for slot in self.slots.iter_mut().flatten() {
            for proc in slot.processes.iter_mut() {
                if proc.pid == pid {
                    if libc::WIFCONTINUED(raw_status) {
                        proc.state = ProcState::Running;
                        proc.exit_status = None;
                    } else if libc::WIFSTOPPED(raw_status) {
                        proc.state = ProcState::Stopped;
                        proc.exit_status = None;
                    } else {
                        proc.state = ProcState::Finished;
                        proc.exit_status = Some(ExitStatus::from_raw(raw_status));
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_tmodes() -> libc::termios {
        unsafe { std::mem::zeroed() }
    }

    fn make_exited(code: i32) -> libc::c_int {
        (code & 0xff) << 8
    }

    fn make_stopped() -> libc::c_int {
        0x7f | (18 << 8)
    }

    #[test]
    fn aggregate_running_outranks_stopped_and_finished() {
        let mut table = JobTable::new();
        let j = table.add_job(123, true, dummy_tmodes());
        table.add_proc(j, 1, &["a".into()]);
        table.add_proc(j, 2, &["b".into()]);
        table.add_proc(j, 3, &["c".into()]);
        table.mark_pid(1, make_exited(0));
        table.mark_pid(2, make_stopped());
        // process 3 left RUNNING
        assert_eq!(table.state(j), Some(JobState::Running));
    }

    #[test]
    fn aggregate_stopped_outranks_finished() {
        let mut table = JobTable::new();
        let j = table.add_job(123, true, dummy_tmodes());
        table.add_proc(j, 1, &["a".into()]);
        table.add_proc(j, 2, &["b".into()]);
        table.mark_pid(1, make_exited(0));
        table.mark_pid(2, make_stopped());
        assert_eq!(table.state(j), Some(JobState::Stopped));
    }

    #[test]
    fn aggregate_all_finished() {
        let mut table = JobTable::new();
        let j = table.add_job(123, true, dummy_tmodes());
        table.add_proc(j, 1, &["a".into()]);
        table.mark_pid(1, make_exited(7));
        assert_eq!(table.state(j), Some(JobState::Finished));
    }

    #[test]
    fn job_state_frees_slot_on_finished() {
        let mut table = JobTable::new();
        let j = table.add_job(123, true, dummy_tmodes());
        table.add_proc(j, 1, &["sleep".into(), "1".into()]);
        table.mark_pid(1, make_exited(3));
        let (state, status) = table.job_state(j);
        assert_eq!(state, JobState::Finished);
        assert_eq!(status, Some(ExitStatus::Exited(3)));
        assert!(table.is_free(j));
    }

    #[test]
    fn move_job_round_trip() {
        let mut table = JobTable::new();
        let a = table.add_job(111, true, dummy_tmodes());
        table.add_proc(a, 1, &["x".into()]);
        let b = table.alloc_job();
        table.move_job(a, b);
        assert!(table.is_free(a));
        assert_eq!(table.pgid(b), 111);
        let c = table.alloc_job();
        table.move_job(b, c);
        assert!(table.is_free(b));
        assert_eq!(table.pgid(c), 111);
    }

    #[test]
    fn add_proc_joins_command_with_pipe_separator() {
        let mut table = JobTable::new();
        let j = table.add_job(1, true, dummy_tmodes());
        table.add_proc(j, 1, &["cat".into(), "f".into()]);
        table.add_proc(j, 2, &["tr".into(), "a-z".into(), "A-Z".into()]);
        assert_eq!(table.job_cmd(j), "cat f | tr a-z A-Z");
    }

    #[test]
    fn highest_unfinished_skips_finished_slots() {
        let mut table = JobTable::new();
        let a = table.add_job(1, true, dummy_tmodes());
        table.add_proc(a, 1, &["a".into()]);
        table.mark_pid(1, make_exited(0));
        let b = table.add_job(2, true, dummy_tmodes());
        table.add_proc(b, 2, &["b".into()]);
        assert_eq!(table.highest_unfinished(), Some(b));
    }
}
