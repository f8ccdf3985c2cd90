use super::*;

fn minimal_yaml() -> &'static str {
    r#"
persona:
  name: 小鸣
  alias_names: ["鸣鸣"]
llm:
  model: gpt-4o-mini
  base_url: https://api.example.com/v1
groups:
  - group_id: 12345
    enabled: true
  - group_id: 67890
    enabled: false
"#
}

#[test]
fn parses_minimal_config_with_defaults() {
    let cfg: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
    assert_eq!(cfg.persona.name, "小鸣");
    assert_eq!(cfg.agent.think_interval, 30);
    assert_eq!(cfg.agent.observe_window, 60);
    assert_eq!(cfg.agent.message_buffer_size, 50);
    assert_eq!(cfg.agent.max_step, 5);
    assert_eq!(cfg.agent.speak_cooldown, 60);
    assert_eq!(cfg.memory.message_log_cleanup.interval_hours, 6);
    assert_eq!(cfg.memory.vector.metric, "COSINE");
    assert!(cfg.sticker.auto_save);
    cfg.validate().unwrap();
}

#[test]
fn group_enablement() {
    let cfg: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
    assert!(cfg.is_group_enabled(12345));
    assert!(!cfg.is_group_enabled(67890));
    assert!(!cfg.is_group_enabled(1));
    assert_eq!(cfg.enabled_groups().count(), 1);
}

#[test]
fn rejects_empty_persona_name() {
    let mut cfg: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
    cfg.persona.name = "  ".into();
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_bad_time_rule() {
    let mut cfg: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
    cfg.chat.time_rules.push(TimeRuleConfig {
        time_range: "25:00-26:00".into(),
        group_id: 0,
        talk_value: 0.5,
    });
    assert!(cfg.validate().is_err());

    cfg.chat.time_rules.clear();
    cfg.chat.time_rules.push(TimeRuleConfig {
        time_range: "23:00-01:00".into(),
        group_id: 0,
        talk_value: 0.8,
    });
    cfg.validate().unwrap();
}

#[test]
fn rejects_unknown_metric() {
    let mut cfg: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
    cfg.memory.vector.metric = "HAMMING".into();
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_out_of_range_talk_frequency() {
    let mut cfg: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
    cfg.chat.talk_frequency = 1.5;
    assert!(cfg.validate().is_err());
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, minimal_yaml()).unwrap();
    let cfg = load(&path).unwrap();
    assert_eq!(cfg.llm.model, "gpt-4o-mini");
}

#[test]
fn load_fails_on_missing_file() {
    assert!(load(Path::new("/nonexistent/config.yaml")).is_err());
}
