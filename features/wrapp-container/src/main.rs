use std::error::Error;

use wrapp_container::{defer, AddOptions, Container, ContainerOptions, EventKind};

fn main() -> Result<(), Box<dyn Error>> {
    let app = Container::new();
    app.on(EventKind::Add, |event| {
        println!("added {:?}", event.key());
    });

    app.add_instance("name", "test".to_string())?
        .add_transient("multiplier", |_| Ok(2), ())?
        .add_singleton(
            "greeting",
            |args| Ok(Test {
                a: args.get::<String>(0)?.to_string(),
                factor: *args.get::<i32>(1)?,
            }),
            ["name", "multiplier"],
        )?;

    app.namespace("Feature", |feature| {
        feature.add_transient("multiplied", |args| Ok(2 * *args.get::<i32>(0)?), ["multiplier"])?;
        Ok(feature)
    })?;

    println!("{:?}", app);
    println!("{:?}", app.get::<Test>("greeting")?);
    println!("Feature.multiplied = {}", app.get::<i32>("Feature.multiplied")?);

    app.add_transient("Feature.multiplied", |_| Ok(-1), AddOptions::new().replace(true))?;
    let feature = app.get::<Container>("Feature")?;
    println!("replaced, namespace now sees {}", feature.get::<i32>("multiplied")?);

    let deferred = Container::with_options(ContainerOptions::deferred());
    deferred
        .add_singleton("config", defer(|_| async { Ok(21) }), ())?
        .add_singleton("answer", |args| Ok(*args.get::<i32>(0)? * 2), ["config"])?;
    let answer = futures::executor::block_on(deferred.get_deferred::<i32>("answer"))?;
    println!("answer = {}", answer);

    Ok(())
}

#[derive(Debug)]
#[allow(dead_code)]
struct Test {
    a: String,
    factor: i32,
}
