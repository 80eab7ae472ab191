//! 按时间合并各 agent 的任务事件日志

use fleet_core::models::TaskStatusEvent;

/// 将多个 agent 的事件合并为一条按时间戳升序的序列
///
/// 稳定排序：时间戳相同的事件保持输入中的相对顺序。
pub fn merge_events<I>(per_agent: I) -> Vec<TaskStatusEvent>
where
    I: IntoIterator<Item = Vec<TaskStatusEvent>>,
{
    let mut events: Vec<TaskStatusEvent> = per_agent.into_iter().flatten().collect();
    events.sort_by_key(|event| event.timestamp);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::models::{Job, TaskState, TaskStatus};

    fn event(agent: &str, timestamp: i64, state: TaskState) -> TaskStatusEvent {
        let job = Job::builder("web", "1", "nginx").build().unwrap();
        TaskStatusEvent::new(TaskStatus::new(job, state), timestamp, agent)
    }

    #[test]
    fn test_merge_orders_across_agents() {
        let merged = merge_events(vec![
            vec![event("h1", 30, TaskState::Running), event("h1", 10, TaskState::Creating)],
            vec![event("h2", 20, TaskState::Starting)],
        ]);
        let timestamps: Vec<i64> = merged.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
        assert_eq!(merged[1].agent, "h2");
    }

    #[test]
    fn test_merge_keeps_ties_in_input_order() {
        let merged = merge_events(vec![
            vec![event("h1", 5, TaskState::Running)],
            vec![event("h2", 5, TaskState::Exited)],
        ]);
        assert_eq!(merged[0].agent, "h1");
        assert_eq!(merged[1].agent, "h2");
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_events(Vec::<Vec<TaskStatusEvent>>::new()).is_empty());
    }
}
