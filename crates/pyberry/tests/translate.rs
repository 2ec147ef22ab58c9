//! End-to-end translation tests: Python source in, Berry source out.
//!
//! Run `cargo insta review` after changing output formatting.

use pyberry::{EmitOptions, ScopeMode, TranslateError, Translator, translate};

fn berry(source: &str) -> String {
    translate(source).unwrap()
}

fn failure(source: &str) -> TranslateError {
    translate(source).unwrap_err()
}

mod scripts {
    use super::*;

    #[test]
    fn test_class_with_initializer() {
        let source = r#"
class TestClass:
    def __init__(self, param1, param2):
        self.param1 = param1
        self.param2 = param2

    def test_method(self):
        return self.param1 + self.param2
"#;
        insta::assert_snapshot!(berry(source), @r"
        class TestClass
            def init(param1, param2)
                self.param1 = param1
                self.param2 = param2
            end
            def test_method()
                return self.param1 + self.param2
            end
        end
        ");
    }

    #[test]
    fn test_if_elif_else() {
        let source = r#"
if not (self.collect_data or self.hems_collect_data or self.hems_check_data):
    self.do_something()
elif self.check_data:
    self.do_something_else()
else:
    self.default_action()
"#;
        insta::assert_snapshot!(berry(source), @r"
        if !(self.collect_data || self.hems_collect_data || self.hems_check_data)
            self.do_something()
        elif self.check_data
            self.do_something_else()
        else
            self.default_action()
        end
        ");
    }

    #[test]
    fn test_augmented_assignment() {
        assert_eq!(berry("self.i += 1\n"), "self.i += 1\n");
    }

    #[test]
    fn test_format_call_passes_through() {
        let source = r#"
self.web_msg = '<h2>Monitoring Data: </h2><textarea name="message" rows="%d" cols="30" readonly>Waiting for data...</textarea>'
self.web_msg = string.format(self.web_msg, self.sequencer.size() + 2)
"#;
        insta::assert_snapshot!(berry(source), @r#"
        self.web_msg = '<h2>Monitoring Data: </h2><textarea name="message" rows="%d" cols="30" readonly>Waiting for data...</textarea>'
        self.web_msg = string.format(self.web_msg, self.sequencer.size() + 2)
        "#);
    }

    #[test]
    fn test_f_string() {
        assert_eq!(
            berry("topic = f\"tele/{self.EUI}/{mqtt_topic_config}\"\n"),
            "var topic = string.format('tele/%s/%s', self.EUI, mqtt_topic_config)\n"
        );
    }

    #[test]
    fn test_nested_dictionary() {
        let source = r#"
self.address_map = {
    "3034": {"name": "PV-V-A", "functioncode": 4, "type": "uint16", "count": 1, "sum": 0},
}
"#;
        assert_eq!(
            berry(source),
            "self.address_map = {'3034': {'name': 'PV-V-A', 'functioncode': 4, 'type': 'uint16', 'count': 1, 'sum': 0}}\n"
        );
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(berry("self.queue = []\n"), "self.queue = []\n");
    }

    #[test]
    fn test_containment_condition() {
        let source = "if \"mode\" in msg:\n    self.mode = msg['mode']\n";
        insta::assert_snapshot!(berry(source), @r"
        if (msg.contains('mode'))
            self.mode = msg['mode']
        end
        ");
    }

    #[test]
    fn test_identity_against_none() {
        let source = "if delay is not None:\n    self.set_delay(delay)\n";
        assert_eq!(
            berry(source),
            "if delay != nil\n    self.set_delay(delay)\nend\n"
        );
    }

    #[test]
    fn test_identity_with_none() {
        let source = "if reading is None:\n    reset()\n";
        assert_eq!(berry(source), "if reading == nil\n    reset()\nend\n");
    }

    #[test]
    fn test_exception_handler() {
        let source = r#"
try:
    self.client.publish(topic, payload)
except Exception as error_msg:
    print('Wrong mqtt query: ', error_msg)
"#;
        insta::assert_snapshot!(berry(source), @r"
        try
            self.client.publish(topic, payload)
        except .. as error_msg
            print('Wrong mqtt query: ', error_msg)
        end
        ");
    }

    #[test]
    fn test_escaped_newline_in_string() {
        assert_eq!(
            berry(r#"print('Finished collecting data:\n', self.json_response)"#),
            "print('Finished collecting data:\\n', self.json_response)\n"
        );
    }

    #[test]
    fn test_inheritance_and_static_method() {
        let source = r#"
class Sensor(Driver):
    @staticmethod
    def scale(raw, factor):
        return raw * factor
"#;
        insta::assert_snapshot!(berry(source), @r"
        class Sensor : Driver
            static def scale(raw, factor)
                return raw * factor
            end
        end
        ");
    }

    #[test]
    fn test_key_iteration() {
        let source = r#"
def dump(values):
    for key in values.keys():
        print(key, values[key])
"#;
        insta::assert_snapshot!(berry(source), @r"
        def dump(values)
            for key : values.keys()
                print(key, values[key])
            end
        end
        ");
    }

    #[test]
    fn test_docstring_and_pass_dropped() {
        let source = r#"
def noop():
    """Nothing to do."""
    pass
"#;
        assert_eq!(berry(source), "def noop()\nend\n");
    }
}

mod scoping {
    use super::*;

    #[test]
    fn test_declared_once() {
        let source = "count = 0\ncount += 1\ncount = count * 2\n";
        let out = berry(source);
        assert_eq!(out, "var count = 0\ncount += 1\ncount = count * 2\n");
        assert_eq!(out.matches("var ").count(), 1);
    }

    #[test]
    fn test_attribute_targets_never_declared() {
        let source = r#"
class Meter:
    def __init__(self):
        self.total = 0
        self.total = self.total + 1
        self.readings = {}
"#;
        let out = berry(source);
        assert!(!out.contains("var self."));
        assert!(!out.contains("var "));
    }

    #[test]
    fn test_methods_have_their_own_frames() {
        let source = r#"
class Poller:
    def first(self):
        result = 1
        return result

    def second(self):
        result = 2
        return result
"#;
        let out = berry(source);
        assert_eq!(out.matches("var result").count(), 2);
    }

    #[test]
    fn test_flat_mode_declares_once_per_module() {
        let source = r#"
def first():
    result = 1

def second():
    result = 2
"#;
        let translator = Translator::new().with_options(EmitOptions {
            scope_mode: ScopeMode::Flat,
            ..EmitOptions::default()
        });
        insta::assert_snapshot!(translator.translate(source).unwrap(), @r"
        def first()
            var result = 1
        end
        def second()
            result = 2
        end
        ");
    }

    #[test]
    fn test_parameters_are_declared() {
        let source = "def set_power(level):\n    level = level + 1\n";
        assert_eq!(
            berry(source),
            "def set_power(level)\n    level = level + 1\nend\n"
        );
    }

    #[test]
    fn test_annotation_without_value() {
        assert_eq!(berry("x: int\nx = 3\n"), "var x\nx = 3\n");
    }

    #[test]
    fn test_default_parameter() {
        let source = "def poll(delay=500):\n    tasmota.set_timer(delay, poll)\n";
        insta::assert_snapshot!(berry(source), @r"
        def poll(delay)
            if delay == nil
                delay = 500
            end
            tasmota.set_timer(delay, /-> poll())
        end
        ");
    }
}

mod rewriting {
    use super::*;

    #[test]
    fn test_methods_remapped_from_initializer_kinds() {
        let source = r#"
class Buffer:
    def __init__(self):
        self.queue = []
        self.cache = dict()

    def add(self, item):
        self.queue.append(item)
        return self.cache.get(item)
"#;
        insta::assert_snapshot!(berry(source), @r"
        class Buffer
            def init()
                self.queue = []
                self.cache = map()
            end
            def add(item)
                self.queue.push(item)
                return self.cache.item(item)
            end
        end
        ");
    }

    #[test]
    fn test_annotated_local_kind() {
        let source = "pending: list = []\npending.append(1)\n";
        assert_eq!(berry(source), "var pending = []\npending.push(1)\n");
    }

    #[test]
    fn test_unknown_receiver_untouched() {
        assert_eq!(berry("client.append(1)\n"), "client.append(1)\n");
    }

    #[test]
    fn test_method_reference_becomes_closure() {
        let source = r#"
class Poller:
    def tick(self):
        self.count += 1

    def every_second(self):
        tasmota.set_timer(1000, self.tick)
"#;
        let out = berry(source);
        assert!(out.contains("tasmota.set_timer(1000, /-> self.tick())"));
    }

    #[test]
    fn test_containment_in_literal_list() {
        let source = "if cmd in ['on', 'off']:\n    run(cmd)\n";
        assert_eq!(
            berry(source),
            "if cmd == 'on' || cmd == 'off'\n    run(cmd)\nend\n"
        );
    }

    #[test]
    fn test_slice_is_inclusive() {
        assert_eq!(berry("head = buf[1:3]\n"), "var head = buf[1..2]\n");
    }

    #[test]
    fn test_empty_slices_rejected() {
        for source in ["head = buf[:0]\n", "head = buf[i:i]\n", "head = buf[2:2]\n"] {
            let err = failure(source);
            assert!(
                matches!(
                    err,
                    TranslateError::UnsupportedConstruct { ref node_kind, .. } if node_kind == "slice"
                ),
                "{source}: {err}"
            );
        }
    }

    #[test]
    fn test_last_recorded_kind_wins() {
        assert_eq!(
            berry("lst = []\nlst = {}\nlst.get(1)\n"),
            "var lst = []\nlst = {}\nlst.item(1)\n"
        );
    }

    #[test]
    fn test_prepass_runs_in_table_order() {
        assert_eq!(
            berry("value = float(json.loads(raw)['v'])\n"),
            "var value = real(json.load(raw)['v'])\n"
        );
    }

    #[test]
    fn test_literal_rendering_is_stable() {
        let source = "empty = {}\nmixed = [1, 'two', 3.5]\n";
        let first = berry(source);
        let second = berry(source);
        assert_eq!(first, second);
        assert_eq!(first, "var empty = {}\nvar mixed = [1, 'two', 3.5]\n");
    }

    #[test]
    fn test_member_declarations() {
        let source = r#"
class Meter:
    def __init__(self):
        self.total = 0

    def reset(self):
        self.last = self.total
"#;
        let translator = Translator::new().with_options(EmitOptions {
            declare_members: true,
            ..EmitOptions::default()
        });
        insta::assert_snapshot!(translator.translate(source).unwrap(), @r"
        class Meter
            var total, last
            def init()
                self.total = 0
            end
            def reset()
                self.last = self.total
            end
        end
        ");
    }
}

mod blocks {
    use super::*;

    const OPENERS: &[&str] = &["class ", "def ", "static def ", "if ", "for ", "while "];

    fn assert_balanced(out: &str) {
        let mut open: Vec<usize> = Vec::new();
        for line in out.lines() {
            let text = line.trim_start();
            let indent = line.len() - text.len();
            if text == "try" || OPENERS.iter().any(|opener| text.starts_with(opener)) {
                open.push(indent);
            } else if text == "end" {
                assert_eq!(open.pop(), Some(indent), "misaligned end in:\n{out}");
            } else if text == "else"
                || text == "finally"
                || text.starts_with("elif ")
                || text.starts_with("except ")
            {
                assert_eq!(open.last(), Some(&indent), "misaligned {text} in:\n{out}");
            }
        }
        assert!(open.is_empty(), "unclosed blocks in:\n{out}");
    }

    #[test]
    fn test_nested_blocks_close_at_their_depth() {
        let source = r#"
class Controller:
    def every_second(self):
        i = 0
        while i < 3:
            if i == 1:
                try:
                    self.step(i)
                except ValueError:
                    pass
                finally:
                    self.flush()
            elif i == 2:
                for key in self.state.keys():
                    print(key)
            else:
                self.idle()
            i += 1
"#;
        let out = berry(source);
        assert_balanced(&out);
        assert_eq!(out.matches("end\n").count(), 6);
    }

    #[test]
    fn test_while_else() {
        let source = "while busy():\n    wait()\nelse:\n    done()\n";
        insta::assert_snapshot!(berry(source), @r"
        while busy()
            wait()
        else
            done()
        end
        ");
    }
}

mod failures {
    use super::*;

    #[test]
    fn test_plain_iteration_unsupported() {
        let err = failure("for item in items:\n    print(item)\n");
        assert!(matches!(
            err,
            TranslateError::UnsupportedConstruct { ref node_kind, .. } if node_kind == "for_statement"
        ));
    }

    #[test]
    fn test_unsupported_statement_names_kind_and_line() {
        let err = failure("x = 1\nwith open(path) as f:\n    pass\n");
        assert_eq!(err.kind(), "unsupported-construct");
        let message = err.to_string();
        assert!(message.contains("`with_statement`"), "{message}");
        assert!(message.ends_with("(line 2)"), "{message}");
    }

    #[test]
    fn test_error_line_is_innermost_statement() {
        let err = failure("def f():\n    x = 1\n    return a ** 2\n");
        assert!(err.to_string().ends_with("(line 3)"), "{err}");
    }

    #[test]
    fn test_tuple_unpacking_malformed() {
        let err = failure("a, b = pair\n");
        assert_eq!(
            err.to_string(),
            "malformed assignment target: tuple unpacking is not supported (line 1)"
        );
    }

    #[test]
    fn test_keyword_argument_unsupported() {
        let err = failure("publish(topic, retain=True)\n");
        assert!(matches!(
            err,
            TranslateError::UnsupportedConstruct { ref node_kind, .. } if node_kind == "keyword_argument"
        ));
    }

    #[test]
    fn test_varargs_unsupported() {
        assert_eq!(failure("def f(*args):\n    pass\n").kind(), "unsupported-construct");
    }

    #[test]
    fn test_syntax_error() {
        let err = failure("x = 1\ny = (\n");
        assert_eq!(err.kind(), "parse");
    }
}

mod files {
    use super::*;
    use pyberry::Config;
    use pyberry::driver::{self, FileOutcome};
    use tempfile::TempDir;

    #[test]
    fn test_unsupported_construct_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("loop.py");
        std::fs::write(&input, "for item in items:\n    print(item)\n").unwrap();

        let err = driver::translate_file(&input, &Translator::default()).unwrap_err();
        assert_eq!(err.kind(), "unsupported-construct");
        assert!(!dir.path().join("loop.be").exists());
    }

    #[test]
    fn test_config_drives_translation() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(Config::FILE_NAME);
        std::fs::write(
            &config_path,
            r#"
[prepass]
substitutions = [["time.sleep", "tasmota.delay"]]

[mappings.classes]
deque = "list"

[mappings.methods.list]
appendleft = "insert"

[output]
extension = "berry"
"#,
        )
        .unwrap();
        let input = dir.path().join("autoexec.py");
        std::fs::write(
            &input,
            "jobs = deque()\njobs.appendleft(0, job)\ntime.sleep(10)\n",
        )
        .unwrap();

        let config = Config::discover(None, dir.path()).unwrap();
        let translator = Translator::from_config(&config);
        let reports = driver::translate_path(&input, &translator).unwrap();

        let output = dir.path().join("autoexec.berry");
        assert!(matches!(
            &reports[0].outcome,
            FileOutcome::Ok { output: written } if *written == output
        ));
        assert_eq!(
            std::fs::read_to_string(output).unwrap(),
            "var jobs = list()\njobs.insert(0, job)\ntasmota.delay(10)\n"
        );
    }
}
