//! End-to-end tests for building environments against a site on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{Error, ErrorKind, Value};
use serde_json::json;
use tempfile::TempDir;
use vellum_render::config::{self, OptionStore};
use vellum_render::{
    Callable, CallableKind, CallableSet, EnvError, Environment, Extension, Plugin, RootKind,
    SiteHost, DEFAULT_NAMESPACE,
};

struct Site {
    dir: TempDir,
}

impl Site {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn host(&self) -> SiteHost {
        SiteHost::new(self.dir.path())
    }

    fn templates(&self) -> PathBuf {
        self.path("templates")
    }
}

fn unnamed(env: &Environment) -> Vec<PathBuf> {
    env.search_paths().paths(DEFAULT_NAMESPACE).to_vec()
}

#[test]
fn default_search_paths_without_view_path() {
    let site = Site::new();
    let host = site.host();

    let default_env = Environment::builder(&host).build().unwrap();
    let same_root = Environment::builder(&host)
        .view_path(site.templates())
        .build()
        .unwrap();

    assert_eq!(unnamed(&default_env), vec![site.templates()]);
    assert_eq!(unnamed(&same_root), unnamed(&default_env));
}

#[test]
fn view_path_and_template_root_both_searched() {
    let site = Site::new();
    site.write("templates/layout.twig", "[{% block body %}{% endblock %}]");
    site.write(
        "plugins/blog/views/post.twig",
        "{% extends \"layout.twig\" %}{% block body %}post{% endblock %}",
    );
    let view = site.path("plugins/blog/views");
    let host = site.host();

    let env = Environment::builder(&host)
        .view_path(&view)
        .build()
        .unwrap();

    let paths = unnamed(&env);
    assert_eq!(paths[0], site.templates());
    assert!(paths.contains(&view));

    // Plugin template, extending a core layout.
    let out = env.render_path(view.join("post.twig"), json!({})).unwrap();
    assert_eq!(out, "[post]");
}

#[test]
fn snippet_roots_are_searchable() {
    let site = Site::new();
    let card = site.write("plugins/cards/snippets/cards/item.TWIG", "card {{ n }}");
    let host = site
        .host()
        .with_snippet("cards/item", &card)
        .with_snippet("legacy", site.path("plugins/cards/snippets/legacy.php"));

    let env = Environment::builder(&host).build().unwrap();

    assert!(unnamed(&env).contains(&site.path("plugins/cards/snippets")));
    assert_eq!(unnamed(&env).len(), 2);
    let out = env
        .render_string("{% include \"cards/item.TWIG\" %}", json!({"n": 1}))
        .unwrap();
    assert_eq!(out, "card 1");
}

#[test]
fn namespaces_defaults_and_overrides() {
    let site = Site::new();
    site.write("snippets/header.twig", "header");
    site.write("shared/button.twig", "button");
    let options = OptionStore::new().with(
        config::NAMESPACES,
        json!({
            "shared": site.path("shared").to_string_lossy(),
            "assets": site.path("assets").to_string_lossy(),
            "missing": site.path("nowhere").to_string_lossy(),
            "broken": 7,
            "empty": "",
        }),
    );
    let host = site.host().with_options(options);

    let env = Environment::builder(&host).build().unwrap();
    let paths = env.search_paths();

    assert!(paths.has_namespace("templates"));
    assert!(paths.has_namespace("snippets"));
    assert!(!paths.has_namespace("plugins"));
    assert!(paths.has_namespace("shared"));
    // Optional namespaces are skipped when missing, custom ones are not.
    assert!(!paths.has_namespace("assets"));
    assert!(paths.has_namespace("missing"));
    assert!(!paths.has_namespace("broken"));
    assert!(!paths.has_namespace("empty"));

    let out = env
        .render_string(
            "{% include \"@snippets/header.twig\" %}/{% include \"@shared/button.twig\" %}",
            json!({}),
        )
        .unwrap();
    assert_eq!(out, "header/button");

    let err = env
        .render_string("{% include \"@missing/card.twig\" %}", json!({}))
        .unwrap_err();
    assert!(matches!(err, EnvError::TemplateNotFound(_)), "{err:?}");
}

#[test]
fn namespace_override_replaces_default() {
    let site = Site::new();
    site.write("alt-snippets/header.twig", "alt header");
    let options = OptionStore::new().with(
        config::NAMESPACES,
        json!({"snippets": site.path("alt-snippets").to_string_lossy()}),
    );
    let host = site.host().with_options(options);

    let env = Environment::builder(&host).build().unwrap();
    assert_eq!(
        env.search_paths().paths("snippets"),
        &[site.path("alt-snippets")]
    );
}

#[test]
fn extra_paths_then_plugin_components_in_order() {
    let site = Site::new();
    site.write("extra/one/page.twig", "one");
    site.write("extra/two/page.twig", "two");
    site.write("components/ui/card.twig", "card");
    let lazy_dir = site.path("components/lazy");
    let produced = lazy_dir.clone();
    let options = OptionStore::new().with(
        config::PATHS,
        json!([
            site.path("extra/one").to_string_lossy(),
            42,
            site.path("extra/two").to_string_lossy(),
        ]),
    );
    let host = site
        .host()
        .with_options(options)
        .with_plugin(Plugin::new("acme/ui").with_components(site.path("components/ui")))
        .with_plugin(Plugin::new("acme/plain"))
        .with_plugin(Plugin::new("acme/lazy").with_lazy_components(move || produced.clone()));

    let env = Environment::builder(&host).build().unwrap();

    assert_eq!(
        unnamed(&env),
        vec![
            site.templates(),
            site.path("extra/one"),
            site.path("extra/two"),
            site.path("components/ui"),
            lazy_dir,
        ]
    );
    assert_eq!(env.render_path("page.twig", json!({})).unwrap(), "one");
    assert_eq!(env.render_path("card.twig", json!({})).unwrap(), "card");
}

fn shout() -> Callable {
    Callable::from_fn(|args| {
        let text = args.first().map(|v| v.to_string()).unwrap_or_default();
        Ok(Value::from(format!("<em>{}</em>", text.to_uppercase())))
    })
}

#[test]
fn safe_marker_controls_escaping() {
    let site = Site::new();
    let host = site
        .host()
        .with_helper("html", shout())
        .with_helper("option", shout());

    let env = Environment::builder(&host).build().unwrap();

    let html = env.render_string("{{ html('a') }}", json!({})).unwrap();
    assert_eq!(html, "<em>A</em>");

    let option = env.render_string("{{ option('a') }}", json!({})).unwrap();
    assert!(option.starts_with("&lt;em&gt;A"), "{option}");

    let functions = env.registered(CallableKind::Function);
    assert!(functions.get("html").unwrap().is_safe());
    assert!(!functions.get("option").unwrap().is_safe());
    assert!(functions.get("*html").is_none());
}

#[test]
fn helpers_nobody_provides_are_skipped() {
    let site = Site::new();
    let options = OptionStore::new().with(
        config::FUNCTIONS,
        json!({"answer": 42, "ghost": "no_such_helper"}),
    );
    let host = site.host().with_options(options);

    let env = Environment::builder(&host).build().unwrap();
    let functions = env.registered(CallableKind::Function);

    // Builtins back a few defaults; everything else needs the host.
    assert!(functions.get("error").is_some());
    assert!(functions.get("slug").is_some());
    assert!(functions.get("kirbytext").is_none());
    assert!(functions.get("answer").is_none());
    assert!(functions.get("ghost").is_none());

    let err = env.render_string("{{ ghost() }}", json!({})).unwrap_err();
    assert!(matches!(err, EnvError::Render(_)));
}

#[test]
fn host_overrides_win_over_defaults() {
    let site = Site::new();
    let options = OptionStore::new()
        .with(config::FUNCTIONS, json!({"slug": "my_slug"}))
        .with(config::FILTERS, json!({"*shout": "shout"}))
        .with(config::TESTS, json!({"of_type": "always"}));
    let host = site
        .host()
        .with_helper("my_slug", Callable::from_fn(|_| Ok(Value::from("custom"))))
        .with_helper("shout", shout())
        .with_helper("always", Callable::from_fn(|_| Ok(Value::from(true))));

    let env = Environment::builder(&host).build().unwrap();

    assert_eq!(
        env.render_string("{{ slug('Hello World') }}", json!({}))
            .unwrap(),
        "custom"
    );
    assert_eq!(
        env.render_string("{{ 'hey' | shout }}", json!({})).unwrap(),
        "<em>HEY</em>"
    );
    assert_eq!(
        env.render_string("{{ 1 is of_type('array') }}", json!({}))
            .unwrap(),
        "true"
    );
}

#[test]
fn builtin_helpers() {
    let site = Site::new();
    let host = site.host();
    let env = Environment::builder(&host).build().unwrap();

    assert_eq!(
        env.render_string("{{ slug('Crème Brûlée!') }}", json!({}))
            .unwrap(),
        "creme-brulee"
    );
    assert_eq!(
        env.render_string(
            "{{ items is of_type('array') }} {{ items is of_type('string') }}",
            json!({"items": [1, 2]})
        )
        .unwrap(),
        "true false"
    );

    let err = env
        .render_string("{{ error('page is gone') }}", json!({}))
        .unwrap_err();
    assert!(err.to_string().contains("page is gone"));
}

struct Money;

impl Extension for Money {
    fn name(&self) -> &str {
        "money"
    }

    fn contribute(&self, set: &mut CallableSet) {
        set.filters.insert(
            "cents",
            Callable::from_fn(|args| {
                let amount = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
                Ok(Value::from(format!("{}.{:02}", amount / 100, amount % 100)))
            }),
        );
        set.functions.insert(
            "slug",
            Callable::from_fn(|_| Ok(Value::from("from-extension"))),
        );
        set.tests.insert(
            "even",
            Callable::from_fn(|args| {
                Ok(Value::from(
                    args.first().and_then(|v| v.as_i64()).unwrap_or(1) % 2 == 0,
                ))
            }),
        );
    }
}

#[test]
fn extensions_contribute_callables() {
    let site = Site::new();
    let host = site.host().with_extension(Arc::new(Money));
    let env = Environment::builder(&host).build().unwrap();

    assert_eq!(
        env.render_string("{{ 1234 | cents }} {{ 4 is even }}", json!({}))
            .unwrap(),
        "12.34 true"
    );
    // The function table is registered after extensions and wins.
    assert_eq!(
        env.render_string("{{ slug('A B') }}", json!({})).unwrap(),
        "a-b"
    );
}

#[test]
fn filters_receive_value_then_arguments() {
    let site = Site::new();
    let options = OptionStore::new().with(config::FILTERS, json!({"wrap": "wrap"}));
    let host = site.host().with_options(options).with_helper(
        "wrap",
        Callable::from_fn(|args| {
            let value = args.first().map(|v| v.to_string()).unwrap_or_default();
            let side = args.get(1).map(|v| v.to_string()).unwrap_or_default();
            Ok(Value::from(format!("{side}{value}{side}")))
        }),
    );
    let env = Environment::builder(&host).build().unwrap();

    assert_eq!(
        env.render_string("{{ 'x' | wrap('-') }}", json!({})).unwrap(),
        "-x-"
    );
}

#[test]
fn callable_errors_become_render_errors() {
    let site = Site::new();
    let host = site.host().with_helper(
        "page",
        Callable::from_fn(|_| Err(Error::new(ErrorKind::InvalidOperation, "no such page"))),
    );
    let env = Environment::builder(&host).build().unwrap();

    let err = env.render_string("{{ page('x') }}", json!({})).unwrap_err();
    assert!(matches!(err, EnvError::Render(_)));
    assert!(err.to_string().contains("no such page"));
}

#[test]
fn strict_variables_follow_debug() {
    let site = Site::new();

    let lenient = Environment::builder(&site.host()).build().unwrap();
    assert!(!lenient.options().strict_variables);
    for source in [
        "[{{ missing }}]",
        "[{{ page.title }}]",
        "[{{ page.author.name }}]",
        "[{% if page.title %}x{% endif %}]",
    ] {
        assert_eq!(lenient.render_string(source, json!({})).unwrap(), "[]", "{source}");
    }

    let debug_host = site
        .host()
        .with_options(OptionStore::new().with(config::DEBUG, true));
    let strict = Environment::builder(&debug_host).build().unwrap();
    assert!(strict.options().strict_variables);
    for source in ["[{{ missing }}]", "[{{ page.title }}]"] {
        let err = strict.render_string(source, json!({})).unwrap_err();
        assert!(matches!(err, EnvError::Render(_)), "{source}");
    }

    let relaxed_host = site.host().with_options(
        OptionStore::new()
            .with(config::DEBUG, true)
            .with(config::STRICT, false),
    );
    let relaxed = Environment::builder(&relaxed_host).build().unwrap();
    assert_eq!(
        relaxed.render_string("[{{ page.title }}]", json!({})).unwrap(),
        "[]"
    );
}

#[test]
fn autoescape_can_be_disabled() {
    let site = Site::new();
    let host = site
        .host()
        .with_options(OptionStore::new().with(config::AUTOESCAPE, false));
    let env = Environment::builder(&host).build().unwrap();

    assert_eq!(
        env.render_string("{{ markup }}", json!({"markup": "<p>hi</p>"}))
            .unwrap(),
        "<p>hi</p>"
    );
}

#[test]
fn cache_directory_follows_option() {
    let site = Site::new();
    let off = Environment::builder(&site.host()).build().unwrap();
    assert_eq!(off.options().cache_directory, None);

    let host = site
        .host()
        .with_root(RootKind::Cache, site.path("var/cache"))
        .with_options(OptionStore::new().with(config::CACHE, true));
    let on = Environment::builder(&host).build().unwrap();
    assert_eq!(
        on.options().cache_directory.as_deref(),
        Some(Path::new(&site.path("var/cache").join(config::CACHE_SUBDIR)))
    );
}

#[test]
fn options_loaded_from_yaml_file() {
    let site = Site::new();
    site.write("templates/hello.twig", "{{ greeting }}");
    let config_path = site.write(
        "config.yaml",
        "debug: true\nvellum:\n  autoescape: false\n",
    );
    let options = OptionStore::from_yaml_file(&config_path).unwrap();
    let host = site.host().with_options(options);

    let env = Environment::builder(&host).build().unwrap();
    assert!(env.options().debug);
    assert_eq!(
        env.render_path(site.path("templates/hello.twig"), json!({"greeting": "<hi>"}))
            .unwrap(),
        "<hi>"
    );
}
